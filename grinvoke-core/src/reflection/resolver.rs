//! # Descriptor Resolver
//!
//! Turns a freshly connected endpoint into a [`ServiceCatalog`]:
//!
//! 1. **List**: asks the reflection service for every service symbol it knows about.
//! 2. **Resolve**: fetches the file defining each symbol, plus its transitive imports. All of it
//!    happens over one reflection stream, so a file shared by several services is fetched once.
//! 3. **Pool**: builds a single `DescriptorPool` out of every fetched file.
//! 4. **Admit**: keeps the unary methods of each service. Streaming methods are logged and dropped,
//!    since a call through this crate is always one request followed by one response.
//!
//! Any failure is fatal: there's no retry and no partially built catalog.
use super::client::{ReflectionClient, ReflectionResolveError};
use crate::{
    BoxError,
    catalog::{MethodEntry, ServiceCatalog, ServiceEntry},
};
use http_body::Body as HttpBody;
use prost_reflect::{DescriptorError, DescriptorPool};
use tonic::client::GrpcService;

/// Reflection services answer `ListServices` with themselves, but they aren't user-facing.
pub const REFLECTION_SERVICES: &[&str] = &[
    "grpc.reflection.v1.ServerReflection",
    "grpc.reflection.v1alpha.ServerReflection",
];

#[derive(Debug, thiserror::Error)]
pub enum ResolveCatalogError {
    #[error("Reflection resolution failed: '{0}'")]
    Reflection(#[from] ReflectionResolveError),
    #[error("Failed to build a descriptor pool from the reflected files: '{0}'")]
    Descriptor(#[from] DescriptorError),
    #[error("Service '{0}' was listed but is not defined by any reflected file")]
    MissingService(String),
}

/// Builds the catalog of an endpoint through its reflection service.
pub async fn resolve_catalog<S>(
    client: &mut ReflectionClient<S>,
) -> Result<ServiceCatalog, ResolveCatalogError>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    let mut session = client.open().await?;

    let service_names: Vec<String> = session
        .list_services()
        .await?
        .into_iter()
        .filter(|name| !REFLECTION_SERVICES.contains(&name.as_str()))
        .collect();

    for name in &service_names {
        session.resolve_symbol(name).await?;
    }

    tracing::debug!(
        services = service_names.len(),
        files = session.files().len(),
        requests = session.requests_sent(),
        "reflection finished"
    );

    let pool = DescriptorPool::from_file_descriptor_set(session.into_file_descriptor_set())?;

    let services = service_names
        .into_iter()
        .map(|name| build_service_entry(&pool, name))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ServiceCatalog::new(pool, services))
}

fn build_service_entry(
    pool: &DescriptorPool,
    name: String,
) -> Result<ServiceEntry, ResolveCatalogError> {
    let service = pool
        .get_service_by_name(&name)
        .ok_or_else(|| ResolveCatalogError::MissingService(name.clone()))?;

    let mut methods = Vec::new();

    for method in service.methods() {
        let client_streaming = method.is_client_streaming();
        let server_streaming = method.is_server_streaming();

        match MethodEntry::unary(method.clone()) {
            Some(entry) => methods.push(entry),
            None => tracing::warn!(
                method = method.full_name(),
                client_streaming,
                server_streaming,
                "skipping streaming method"
            ),
        }
    }

    Ok(ServiceEntry::new(name, methods))
}
