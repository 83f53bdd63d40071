//! Expression Compiler (§4.1): parses and type-checks one CEL-like
//! expression under a declared variable list and emits an opaque,
//! serialized AET; also evaluates a previously compiled AET against
//! typed bindings.

pub mod aet;
pub mod compiler;
pub mod error;

pub use aet::Aet;
pub use compiler::{compile, evaluate};
pub use error::DslError;
