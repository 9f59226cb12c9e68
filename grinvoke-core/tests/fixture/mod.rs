//! In-process endpoints for integration tests.
//!
//! `GreeterImpl` is the remote side. [`InProcess`] wraps the routes of one endpoint, counts the
//! calls that reach it and appends the trailers requested by a handler to the response body.
#![allow(dead_code)]

use greeter_service::pb::{
    GetVersionReply, GetVersionRequest, HelloReply, HelloRequest, Specimen, StreamReply,
    StreamRequest,
};
use greeter_service::{FILE_DESCRIPTOR_SET, Greeter, GreeterServer};
use grinvoke_core::{
    BoxError, Config, Workbench,
    manager::connector::{ConnectError, Connector},
};
use http_body::{Body as HttpBody, Frame};
use std::{
    collections::{HashMap, HashSet},
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll, ready},
    time::Duration,
};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{
    Request, Response, Status, Streaming,
    body::Body,
    codegen::{BoxFuture, Bytes, Service},
    metadata::MetadataValue,
    service::Routes,
};

pub const GREETER: &str = "helloworld.Greeter";

/// Trailers a handler wants appended to its response.
#[derive(Debug, Clone)]
struct PendingTrailers(http::HeaderMap);

pub struct GreeterImpl;

#[tonic::async_trait]
impl Greeter for GreeterImpl {
    type ServerStreamStream = ReceiverStream<Result<StreamReply, Status>>;
    type ChatStream = ReceiverStream<Result<StreamReply, Status>>;

    /// Replies `hello <name>`.
    ///
    /// * `x-delay-ms` delays the reply.
    /// * `x-echo-header` is echoed back as the `header-key` response header.
    /// * `x-echo-trailer` is echoed back as the `trailer-key` response trailer.
    /// * `x-token-bin` is decoded and echoed back as the plain `token` response header.
    async fn say_hello(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<HelloReply>, Status> {
        let metadata = request.metadata().clone();
        let name = request.into_inner().name;

        if name.is_empty() {
            return Err(Status::invalid_argument("name must not be empty"));
        }

        if let Some(delay) = metadata
            .get("x-delay-ms")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
        {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut response = Response::new(HelloReply {
            message: format!("hello {name}"),
        });

        if let Some(value) = metadata.get("x-echo-header") {
            response.metadata_mut().insert("header-key", value.clone());
        }

        if let Some(value) = metadata.get_bin("x-token-bin") {
            let bytes = value
                .to_bytes()
                .map_err(|e| Status::invalid_argument(e.to_string()))?;
            let token = String::from_utf8_lossy(&bytes)
                .parse()
                .map_err(|_| Status::invalid_argument("token is not printable"))?;
            response.metadata_mut().insert("token", token);
        }

        if let Some(value) = metadata.get("x-echo-trailer") {
            let mut trailers = http::HeaderMap::new();
            let value = http::HeaderValue::from_bytes(value.as_encoded_bytes())
                .map_err(|e| Status::internal(e.to_string()))?;
            trailers.insert("trailer-key", value);
            response.extensions_mut().insert(PendingTrailers(trailers));
        }

        Ok(response)
    }

    async fn get_version(
        &self,
        _request: Request<GetVersionRequest>,
    ) -> Result<Response<GetVersionReply>, Status> {
        let mut response = Response::new(GetVersionReply {
            version: "1.0.2".to_string(),
        });
        response
            .metadata_mut()
            .insert("x-server", MetadataValue::from_static("greeter"));
        Ok(response)
    }

    async fn inspect(&self, request: Request<Specimen>) -> Result<Response<Specimen>, Status> {
        Ok(Response::new(request.into_inner()))
    }

    async fn client_stream(
        &self,
        _request: Request<Streaming<StreamRequest>>,
    ) -> Result<Response<StreamReply>, Status> {
        Err(Status::unimplemented("streaming is not exercised"))
    }

    async fn server_stream(
        &self,
        _request: Request<StreamRequest>,
    ) -> Result<Response<Self::ServerStreamStream>, Status> {
        Err(Status::unimplemented("streaming is not exercised"))
    }

    async fn chat(
        &self,
        _request: Request<Streaming<StreamRequest>>,
    ) -> Result<Response<Self::ChatStream>, Status> {
        Err(Status::unimplemented("streaming is not exercised"))
    }
}

/// Routes of the greeter plus a `grpc.reflection.v1` server describing it.
pub fn greeter_routes() -> Routes {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .unwrap();

    Routes::new(reflection_service).add_service(GreeterServer::new(GreeterImpl))
}

/// The greeter alone, without reflection.
pub fn greeter_routes_without_reflection() -> Routes {
    Routes::new(GreeterServer::new(GreeterImpl))
}

/// An in-process endpoint.
#[derive(Clone)]
pub struct InProcess {
    routes: Routes,
    calls: Arc<AtomicUsize>,
}

impl InProcess {
    pub fn new(routes: Routes) -> Self {
        Self {
            routes,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of requests that reached the endpoint, reflection included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Service<http::Request<Body>> for InProcess {
    type Response = http::Response<Body>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Service::<http::Request<Body>>::poll_ready(&mut self.routes, cx)
    }

    fn call(&mut self, request: http::Request<Body>) -> Self::Future {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.routes.call(request);

        Box::pin(async move {
            let (mut parts, body) = response.await?.into_parts();
            let body = match parts.extensions.remove::<PendingTrailers>() {
                Some(PendingTrailers(extra)) => Body::new(WithTrailers {
                    inner: body,
                    extra: Some(extra),
                }),
                None => body,
            };
            Ok(http::Response::from_parts(parts, body))
        })
    }
}

/// Merges extra entries into the trailers frame of `inner`.
struct WithTrailers {
    inner: Body,
    extra: Option<http::HeaderMap>,
}

impl HttpBody for WithTrailers {
    type Data = Bytes;
    type Error = Status;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Status>>> {
        let this = self.get_mut();
        let mut frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));

        if let Some(Ok(frame)) = &mut frame
            && let Some(trailers) = frame.trailers_mut()
            && let Some(extra) = this.extra.take()
        {
            trailers.extend(extra);
        }

        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }
}

/// Hands out in-process endpoints by address. Unknown addresses are refused.
#[derive(Clone, Default)]
pub struct InProcessConnector {
    endpoints: HashMap<(String, u16), InProcess>,
    unresponsive: HashSet<(String, u16)>,
}

impl InProcessConnector {
    pub fn with_endpoint(mut self, host: &str, port: u16, endpoint: InProcess) -> Self {
        self.endpoints.insert((host.to_string(), port), endpoint);
        self
    }

    /// An address whose connection attempts never complete.
    pub fn with_unresponsive(mut self, host: &str, port: u16) -> Self {
        self.unresponsive.insert((host.to_string(), port));
        self
    }
}

impl Connector for InProcessConnector {
    type Service = InProcess;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        _timeout: Duration,
    ) -> Result<InProcess, ConnectError> {
        let addr = (host.to_string(), port);
        if self.unresponsive.contains(&addr) {
            return std::future::pending().await;
        }

        self.endpoints
            .get(&addr)
            .cloned()
            .ok_or_else(|| {
                let err: BoxError = "connection refused".into();
                ConnectError::ConnectionFailed(format!("http://{host}:{port}"), err)
            })
    }
}

/// A workbench that can reach one greeter at `127.0.0.1:50051`.
pub fn greeter_workbench() -> (Workbench<InProcessConnector>, InProcess) {
    greeter_workbench_with_config(&Config::default())
}

pub fn greeter_workbench_with_config(config: &Config) -> (Workbench<InProcessConnector>, InProcess) {
    let endpoint = InProcess::new(greeter_routes());
    let connector = InProcessConnector::default().with_endpoint("127.0.0.1", 50051, endpoint.clone());
    (Workbench::with_connector(connector, config), endpoint)
}
