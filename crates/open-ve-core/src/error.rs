//! Unified error taxonomy (§7). Every component surfaces one of these
//! kinds; the RPC interceptor and the HTTP gateway each translate the
//! same value to their own status vocabulary, so both protocol
//! surfaces agree on what a given failure means.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("expression compile error: {0}")]
    ExpressionCompile(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("validation unit not found: {0}")]
    UnitNotFound(String),

    #[error("invalid request parameter: {0}")]
    RequestParameterInvalid(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("forward to slave failed: {0}")]
    ForwardFailed(String),

    #[error("server configuration error: {0}")]
    ServerConfig(String),

    #[error("internal server error: {0}")]
    ServerInternal(String),
}

impl AppError {
    /// RPC status code this kind maps to (§7 table).
    pub fn to_tonic_code(&self) -> tonic::Code {
        match self {
            AppError::SchemaError(_) => tonic::Code::InvalidArgument,
            AppError::ExpressionCompile(_) => tonic::Code::InvalidArgument,
            AppError::StoreUnavailable(_) => tonic::Code::Internal,
            AppError::UnitNotFound(_) => tonic::Code::NotFound,
            AppError::RequestParameterInvalid(_) => tonic::Code::InvalidArgument,
            AppError::AuthenticationFailed => tonic::Code::Unauthenticated,
            AppError::ForwardFailed(_) => tonic::Code::Internal,
            AppError::ServerConfig(_) => tonic::Code::InvalidArgument,
            AppError::ServerInternal(_) => tonic::Code::Internal,
        }
    }

    /// HTTP status this kind maps to, for the JSON gateway.
    pub fn to_http_status(&self) -> u16 {
        match self {
            AppError::SchemaError(_) => 400,
            AppError::ExpressionCompile(_) => 400,
            AppError::StoreUnavailable(_) => 500,
            AppError::UnitNotFound(_) => 404,
            AppError::RequestParameterInvalid(_) => 400,
            AppError::AuthenticationFailed => 401,
            AppError::ForwardFailed(_) => 500,
            AppError::ServerConfig(_) => 400,
            AppError::ServerInternal(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::SchemaError(_) => "SchemaError",
            AppError::ExpressionCompile(_) => "ExpressionCompile",
            AppError::StoreUnavailable(_) => "StoreUnavailable",
            AppError::UnitNotFound(_) => "UnitNotFound",
            AppError::RequestParameterInvalid(_) => "RequestParameterInvalid",
            AppError::AuthenticationFailed => "AuthenticationFailed",
            AppError::ForwardFailed(_) => "ForwardFailed",
            AppError::ServerConfig(_) => "ServerConfig",
            AppError::ServerInternal(_) => "ServerInternal",
        }
    }
}

impl From<tonic::Status> for AppError {
    fn from(status: tonic::Status) -> Self {
        AppError::ForwardFailed(status.message().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_kind_to_the_documented_status() {
        assert_eq!(
            AppError::SchemaError("x".into()).to_tonic_code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(AppError::UnitNotFound("x".into()).to_http_status(), 404);
        assert_eq!(AppError::AuthenticationFailed.to_http_status(), 401);
        assert_eq!(AppError::StoreUnavailable("x".into()).to_tonic_code(), tonic::Code::Internal);
    }
}
