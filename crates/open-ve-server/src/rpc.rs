//! `tonic` service implementations (§4.7): each method delegates into
//! `open-ve-service`'s components, mirroring the HTTP handlers in
//! `open-ve-api::handlers` one-for-one so both protocol surfaces agree
//! on behavior. Authentication and access logging are done per-call
//! (`Authenticator::authenticate` is async and a `tonic` interceptor
//! is not, so the check lives in the method body instead, the same
//! choice `open-ve-api::handlers` makes for the HTTP surface).

use std::collections::HashMap;
use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::instrument;

use open_ve_core::{AppError, AuthnConfig, AuthnMethod, SlaveNode};
use open_ve_rpc::convert::{any_to_tagged_value, dsl_to_proto, proto_to_dsl};
use open_ve_rpc::dsl_service_server::DslService;
use open_ve_rpc::slave_service_server::SlaveService;
use open_ve_rpc::validate_service_server::ValidateService;
use open_ve_rpc::{
    CheckRequest, CheckResponse, CheckResult, ReadRequest, ReadResponse, RegisterRequest,
    RegisterResponse, SlaveRegisterRequest, SlaveRegisterResponse,
};
use open_ve_service::{AuthContext, Authenticator, Evaluator, SchemaRegistrar, SlaveRegistry};

fn to_status(err: AppError) -> Status {
    Status::new(err.to_tonic_code(), err.to_string())
}

fn bearer_from_metadata(req: &Request<impl Sized>) -> Option<String> {
    req.metadata()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

async fn authenticate(
    authenticator: &dyn Authenticator,
    req: &Request<impl Sized>,
) -> Result<(), Status> {
    let ctx = AuthContext::from_bearer(bearer_from_metadata(req));
    authenticator
        .authenticate(&ctx)
        .await
        .map_err(to_status)
}

pub struct ValidateServiceImpl {
    pub evaluator: Arc<Evaluator>,
    pub authenticator: Arc<dyn Authenticator>,
}

#[tonic::async_trait]
impl ValidateService for ValidateServiceImpl {
    #[instrument(skip(self, request))]
    async fn check(
        &self,
        request: Request<CheckRequest>,
    ) -> Result<Response<CheckResponse>, Status> {
        authenticate(self.authenticator.as_ref(), &request).await?;

        let items = request.into_inner().validations;
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let mut bindings = HashMap::with_capacity(item.variables.len());
            for (name, any) in item.variables {
                let value = any_to_tagged_value(&any).map_err(to_status)?;
                bindings.insert(name, value);
            }
            let outcome = self
                .evaluator
                .evaluate(&item.id, bindings)
                .await
                .map_err(to_status)?;
            results.push(CheckResult {
                id: item.id,
                is_valid: outcome.is_valid,
                message: outcome.message,
            });
        }

        Ok(Response::new(CheckResponse { results }))
    }
}

pub struct DslServiceImpl {
    pub registrar: Arc<SchemaRegistrar>,
    pub authenticator: Arc<dyn Authenticator>,
}

#[tonic::async_trait]
impl DslService for DslServiceImpl {
    #[instrument(skip(self, request))]
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        authenticate(self.authenticator.as_ref(), &request).await?;

        let proto_dsl = request
            .into_inner()
            .dsl
            .ok_or_else(|| Status::invalid_argument("request missing `dsl`"))?;
        let dsl = proto_to_dsl(proto_dsl).map_err(to_status)?;
        self.registrar.register(dsl).await.map_err(to_status)?;
        Ok(Response::new(RegisterResponse {}))
    }

    #[instrument(skip(self, request))]
    async fn read(
        &self,
        request: Request<ReadRequest>,
    ) -> Result<Response<ReadResponse>, Status> {
        authenticate(self.authenticator.as_ref(), &request).await?;

        let dsl = self.registrar.read().await.map_err(to_status)?;
        Ok(Response::new(ReadResponse {
            dsl: Some(dsl_to_proto(&dsl)),
        }))
    }
}

pub struct SlaveServiceImpl {
    pub slave_registry: Option<Arc<SlaveRegistry>>,
    pub authenticator: Arc<dyn Authenticator>,
}

#[tonic::async_trait]
impl SlaveService for SlaveServiceImpl {
    #[instrument(skip(self, request))]
    async fn register(
        &self,
        request: Request<SlaveRegisterRequest>,
    ) -> Result<Response<SlaveRegisterResponse>, Status> {
        authenticate(self.authenticator.as_ref(), &request).await?;

        let Some(registry) = &self.slave_registry else {
            return Err(to_status(AppError::ServerConfig(
                "slave registration is only accepted on a master node".to_string(),
            )));
        };

        let req = request.into_inner();
        let authn = req
            .authn
            .map(|a| AuthnConfig {
                method: match a.method.as_str() {
                    "preshared" => Some(AuthnMethod::Preshared),
                    "none" => Some(AuthnMethod::None),
                    _ => None,
                },
                preshared_key: a.preshared.map(|p| p.key),
            })
            .unwrap_or_default();

        registry.register_slave(SlaveNode {
            id: req.id,
            http_address: req.address,
            tls_enabled: req.tls_enabled,
            validation_ids: req.validation_ids,
            authn,
        });

        Ok(Response::new(SlaveRegisterResponse {}))
    }
}
