//! # Connection Manager
//!
//! Owns one live channel per distinct `(host, port)` and the [`ServiceCatalog`] resolved
//! through it.
//!
//! * **Registration** connects (bounded by the configured connect timeout), runs the
//!   [Descriptor Resolver](crate::reflection::resolver) once, and only then publishes the
//!   endpoint. A failure at any step leaves the registry untouched.
//! * Registrations are serialized, so two concurrent attempts for the same address can't both
//!   pass the duplicate check.
//! * Catalogs are immutable once published. Readers clone `Arc` handles and never wait on
//!   network I/O.
//!
//! Endpoints live as long as the manager: there's no deregistration and no refresh.
//! A changed remote interface is only observed by a new manager.
pub mod connector;

use crate::{
    BoxError,
    catalog::{MethodEntry, ServiceCatalog, ServiceSummary},
    reflection::{
        client::ReflectionClient,
        resolver::{ResolveCatalogError, resolve_catalog},
    },
};
use connector::{ConnectError, Connector, TcpConnector};
use http_body::Body as HttpBody;
use serde::Serialize;
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::sync::{Mutex, RwLock};
use tonic::client::GrpcService;

/// Identity of an endpoint. At most one endpoint exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub host: String,
    pub port: u16,
}

impl EndpointKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("An endpoint is already registered for '{0}'")]
    DuplicateRegistration(EndpointKey),
    #[error(transparent)]
    Connection(#[from] ConnectError),
    #[error("Failed to resolve the services exposed by '{key}': '{source}'")]
    Resolve {
        key: EndpointKey,
        #[source]
        source: ResolveCatalogError,
    },
}

/// No registered endpoint exposes the requested unary method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Method '{service}/{method}' not found")]
pub struct MethodNotFound {
    pub service: String,
    pub method: String,
}

/// A connected endpoint and its catalog.
///
/// There is no connectivity state to read here: a `tonic` channel reconnects on its own and does
/// not report whether it is idle, connecting or ready. A broken connection shows up as the
/// `Unavailable` status of the next call.
#[derive(Debug)]
pub struct Endpoint<S> {
    name: String,
    key: EndpointKey,
    seq: u64,
    service: S,
    catalog: ServiceCatalog,
}

impl<S> Endpoint<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// The live channel. Cloning it is cheap and calls on clones are multiplexed.
    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn summary(&self) -> EndpointSummary {
        EndpointSummary {
            name: self.name.clone(),
            host: self.key.host.clone(),
            port: self.key.port,
            services: self
                .catalog
                .services()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointSummary {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub services: Vec<String>,
}

pub struct ConnectionManager<C: Connector = TcpConnector> {
    connector: C,
    connect_timeout: Duration,
    endpoints: RwLock<HashMap<EndpointKey, Arc<Endpoint<C::Service>>>>,
    /// Held for a whole registration; stores the next registration sequence number.
    registration: Mutex<u64>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            endpoints: RwLock::new(HashMap::new()),
            registration: Mutex::new(0),
        }
    }

    /// All endpoints, in registration order.
    pub async fn endpoints(&self) -> Vec<Arc<Endpoint<C::Service>>> {
        let mut endpoints: Vec<_> = self.endpoints.read().await.values().cloned().collect();
        endpoints.sort_by_key(|e| e.seq);
        endpoints
    }

    /// Catalog listings of every endpoint, in registration order.
    pub async fn list_catalogs(&self) -> Vec<ServiceSummary> {
        self.endpoints()
            .await
            .iter()
            .flat_map(|e| e.catalog().summaries().collect::<Vec<_>>())
            .collect()
    }

    /// Finds a method across all endpoints. The earliest registered endpoint wins when
    /// several expose the same service.
    pub async fn find_method(
        &self,
        service: &str,
        method: &str,
    ) -> Result<(Arc<Endpoint<C::Service>>, MethodEntry), MethodNotFound> {
        self.endpoints()
            .await
            .into_iter()
            .find_map(|endpoint| {
                let entry = endpoint.catalog().find_method(service, method)?.clone();
                Some((endpoint, entry))
            })
            .ok_or_else(|| MethodNotFound {
                service: service.to_string(),
                method: method.to_string(),
            })
    }
}

impl<C> ConnectionManager<C>
where
    C: Connector,
    C::Service: GrpcService<tonic::body::Body>,
    <C::Service as GrpcService<tonic::body::Body>>::Error: Into<BoxError>,
    <C::Service as GrpcService<tonic::body::Body>>::ResponseBody:
        HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <<C::Service as GrpcService<tonic::body::Body>>::ResponseBody as HttpBody>::Error:
        Into<BoxError> + Send,
{
    /// Connects to `host:port`, resolves its catalog and publishes the endpoint.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<Endpoint>)` - The registered endpoint.
    /// * `Err(RegisterError::DuplicateRegistration)` - `(host, port)` is already registered.
    /// * `Err(RegisterError::Connection)` - The channel couldn't be opened in time.
    /// * `Err(RegisterError::Resolve)` - The reflection calls failed.
    pub async fn register(
        &self,
        name: &str,
        host: &str,
        port: u16,
    ) -> Result<Arc<Endpoint<C::Service>>, RegisterError> {
        let key = EndpointKey::new(host, port);
        let mut next_seq = self.registration.lock().await;

        if self.endpoints.read().await.contains_key(&key) {
            tracing::warn!(%name, endpoint = %key, "endpoint already registered");
            return Err(RegisterError::DuplicateRegistration(key));
        }

        let service = tokio::time::timeout(
            self.connect_timeout,
            self.connector.connect(host, port, self.connect_timeout),
        )
        .await
        .unwrap_or_else(|_| Err(ConnectError::Timeout(key.to_string(), self.connect_timeout)))
        .inspect_err(|err| tracing::warn!(%name, endpoint = %key, %err, "connection failed"))?;

        let mut reflection = ReflectionClient::new(service.clone());
        let catalog = resolve_catalog(&mut reflection).await.map_err(|source| {
            tracing::warn!(%name, endpoint = %key, err = %source, "service resolution failed");
            RegisterError::Resolve {
                key: key.clone(),
                source,
            }
        })?;

        let endpoint = Arc::new(Endpoint {
            name: name.to_string(),
            key: key.clone(),
            seq: *next_seq,
            service,
            catalog,
        });
        *next_seq += 1;

        self.endpoints.write().await.insert(key, endpoint.clone());

        tracing::info!(
            %name,
            endpoint = %endpoint.key(),
            services = endpoint.catalog().services().len(),
            "endpoint registered"
        );

        Ok(endpoint)
    }
}
