//! Shared domain types for Open-VE: the validation unit model, the
//! tagged scalar value used across the HTTP and RPC surfaces, and the
//! unified error taxonomy both surfaces translate from.

pub mod error;
pub mod model;
pub mod value;

pub use error::AppError;
pub use model::{AuthnConfig, AuthnMethod, Dsl, SlaveNode, TestCase, Validation, Variable, VariableType};
pub use value::TaggedValue;
