//! # Workbench
//!
//! The entry point consumed by front-ends: register endpoints, browse their catalogs, fetch
//! method schemas and invoke methods.
//!
//! ```no_run
//! # use grinvoke_core::{Workbench, config::Config, invoke::InvokeRequest};
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let workbench = Workbench::new(&Config::default());
//! workbench.register("greeter", "127.0.0.1", 50051).await?;
//!
//! let schema = workbench.get_schema("helloworld.Greeter", "SayHello").await?;
//! println!("{}", serde_json::to_string_pretty(&schema.input)?);
//!
//! let result = workbench
//!     .invoke(InvokeRequest::new("helloworld.Greeter", "SayHello", r#"{"name": "world"}"#))
//!     .await?;
//! println!("{}", result.data);
//! # Ok(())
//! # }
//! ```
use crate::{
    BoxError,
    catalog::ServiceSummary,
    config::Config,
    invoke::{DynamicInvoker, InvokeError, InvokeRequest, InvokeResult},
    manager::{
        ConnectionManager, Endpoint, EndpointSummary, MethodNotFound, RegisterError,
        connector::{Connector, TcpConnector},
    },
    schema::{MethodSchema, SchemaCompiler},
};
use http_body::Body as HttpBody;
use std::sync::Arc;
use tonic::client::GrpcService;

pub struct Workbench<C: Connector = TcpConnector> {
    manager: ConnectionManager<C>,
    compiler: SchemaCompiler,
    invoker: DynamicInvoker,
}

impl Workbench<TcpConnector> {
    pub fn new(config: &Config) -> Self {
        Self::with_connector(TcpConnector, config)
    }
}

impl<C: Connector> Workbench<C> {
    pub fn with_connector(connector: C, config: &Config) -> Self {
        Self {
            manager: ConnectionManager::new(connector, config.connect_timeout()),
            compiler: SchemaCompiler::new(&config.schema),
            invoker: DynamicInvoker::new(config),
        }
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    pub async fn list_catalogs(&self) -> Vec<ServiceSummary> {
        self.manager.list_catalogs().await
    }

    pub async fn list_endpoints(&self) -> Vec<EndpointSummary> {
        self.manager
            .endpoints()
            .await
            .iter()
            .map(|e| e.summary())
            .collect()
    }

    /// Compiles the input and output schemas of a method. Schemas are built fresh on each call.
    pub async fn get_schema(
        &self,
        service: &str,
        method: &str,
    ) -> Result<MethodSchema, MethodNotFound> {
        let (_, entry) = self.manager.find_method(service, method).await?;
        Ok(self.compiler.compile_method(&entry))
    }
}

impl<C> Workbench<C>
where
    C: Connector,
    C::Service: GrpcService<tonic::body::Body>,
    <C::Service as GrpcService<tonic::body::Body>>::Error: Into<BoxError>,
    <C::Service as GrpcService<tonic::body::Body>>::ResponseBody:
        HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <<C::Service as GrpcService<tonic::body::Body>>::ResponseBody as HttpBody>::Error:
        Into<BoxError> + Send,
{
    pub async fn register(
        &self,
        name: &str,
        host: &str,
        port: u16,
    ) -> Result<Arc<Endpoint<C::Service>>, RegisterError> {
        self.manager.register(name, host, port).await
    }

    pub async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResult, InvokeError> {
        self.invoker.invoke(&self.manager, request).await
    }
}
