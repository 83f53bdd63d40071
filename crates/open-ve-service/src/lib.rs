//! Coordination fabric atop `open-ve-dsl`/`open-ve-store`: the Schema
//! Registrar (§4.3), the Evaluator (§4.4), the master-side Slave
//! Registry (§4.5) and slave-side Slave Registrar (§4.6), the
//! Authenticator (§4.9), and the two offline CLI collaborators (the
//! test-case runner and the OpenAPI-to-schema generator, §6.1).

pub mod authn;
pub mod evaluator;
pub mod generator;
pub mod registrar;
pub mod slave_registrar;
pub mod slave_registry;
pub mod tester;

pub use authn::{AuthContext, Authenticator, NoopAuthenticator, PresharedKeyAuthenticator};
pub use evaluator::{CheckResult, Evaluator};
pub use generator::{generate_from_openapi2, GeneratorError};
pub use registrar::{RegisterHook, SchemaRegistrar};
pub use slave_registrar::{DslSource, ReregisterOnSchemaChange, SlaveRegistrar};
pub use slave_registry::SlaveRegistry;
pub use tester::{run as run_tests, TestReport, ValidationTestResult};
