//! Generated RPC types/clients/servers for §4.7's binary RPC surface
//! (`Check`, `Register`, `Read`, `SlaveRegister`), compiled by
//! `build.rs` from `proto/open_ve.proto`. Health is served separately
//! by `tonic_health`'s standard `grpc.health.v1` implementation, per
//! §4.7's `Health.{Check,Watch}`.

pub mod convert;

pub mod open_ve {
    pub mod v1 {
        tonic::include_proto!("open_ve.v1");
    }
}

pub use open_ve::v1::*;
