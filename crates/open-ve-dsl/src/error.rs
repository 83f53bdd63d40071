use thiserror::Error;

/// §4.1 contract errors. Converted to `open_ve_core::AppError` at the
/// component boundary (`SchemaRegistrar`/`Evaluator`), never leaked
/// past `open-ve-dsl` as-is.
#[derive(Error, Debug)]
pub enum DslError {
    #[error("unsupported variable type: {0}")]
    VariableTypeUnsupported(String),

    #[error("expression syntax error in `{expr}`: {detail}")]
    ExpressionSyntax { expr: String, detail: String },

    #[error("AET serialization failed: {0}")]
    Serialize(String),

    #[error("AET deserialization failed: {0}")]
    Deserialize(String),

    #[error("expression evaluation failed: {0}")]
    Evaluation(String),

    #[error("expression result was not boolean")]
    NonBooleanResult,

    #[error("binding type mismatch for variable `{0}`")]
    TypeMismatch(String),
}
