//! # Dynamic Invoker
//!
//! Turns a JSON payload into a wire message of the method's input type, performs the unary call
//! over the owning endpoint's channel and turns the response back into JSON.
//!
//! The invoker keeps no mutable state between calls. Each call clones the endpoint's channel, so
//! concurrent invocations are multiplexed by the channel itself.
use crate::{
    BoxError,
    config::Config,
    grpc::{
        client::{GrpcClient, GrpcRequestError},
        metadata::{self, MetadataEntries, MetadataError},
    },
    json,
    manager::{ConnectionManager, MethodNotFound, connector::Connector},
};
use http_body::Body as HttpBody;
use prost_reflect::{DeserializeOptions, SerializeOptions};
use serde::Serialize;
use std::time::Duration;
use tonic::client::GrpcService;

/// A request to invoke a unary method.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Fully-qualified service name, e.g. `helloworld.Greeter`.
    pub service: String,
    pub method: String,
    /// JSON document of the method's input type.
    pub payload: String,
    /// Outgoing metadata.
    pub headers: Vec<(String, String)>,
    /// Overrides the configured default deadline.
    pub deadline: Option<Duration>,
}

impl InvokeRequest {
    pub fn new(
        service: impl Into<String>,
        method: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            payload: payload.into(),
            headers: Vec::new(),
            deadline: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// The decoded response and the metadata captured around it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvokeResult {
    pub data: serde_json::Value,
    pub header: MetadataEntries,
    pub trailer: MetadataEntries,
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error(transparent)]
    NotFound(#[from] MethodNotFound),
    #[error("Invalid payload for '{message}': '{source}'")]
    InvalidPayload {
        message: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    InvalidMetadata(#[from] MetadataError),
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    /// The remote call failed. The status is the one returned by the server or the transport.
    #[error("gRPC call failed: {}: {}", .0.code(), .0.message())]
    Rpc(tonic::Status),
    #[error("Failed to convert the response to JSON: '{0}'")]
    InvalidResponse(#[source] serde_json::Error),
}

impl From<GrpcRequestError> for InvokeError {
    fn from(err: GrpcRequestError) -> Self {
        match err {
            GrpcRequestError::ClientNotReady(err) => InvokeError::ClientNotReady(err),
            GrpcRequestError::InvalidMetadata(err) => InvokeError::InvalidMetadata(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DynamicInvoker {
    default_deadline: Option<Duration>,
    deserialize_options: DeserializeOptions,
    serialize_options: SerializeOptions,
}

impl DynamicInvoker {
    pub fn new(config: &Config) -> Self {
        Self {
            default_deadline: config.default_deadline(),
            deserialize_options: config.json.deserialize_options(),
            serialize_options: config.json.serialize_options(),
        }
    }

    /// Invokes `request.service/request.method` on the endpoint that exposes it.
    ///
    /// Lookup, payload decoding and metadata validation all happen before the channel is used,
    /// so `NotFound`, `InvalidPayload` and `InvalidMetadata` never reach the network.
    pub async fn invoke<C>(
        &self,
        manager: &ConnectionManager<C>,
        request: InvokeRequest,
    ) -> Result<InvokeResult, InvokeError>
    where
        C: Connector,
        C::Service: GrpcService<tonic::body::Body>,
        <C::Service as GrpcService<tonic::body::Body>>::Error: Into<BoxError>,
        <C::Service as GrpcService<tonic::body::Body>>::ResponseBody:
            HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <<C::Service as GrpcService<tonic::body::Body>>::ResponseBody as HttpBody>::Error:
            Into<BoxError> + Send,
    {
        let (endpoint, method) = manager
            .find_method(&request.service, &request.method)
            .await?;

        let input = json::from_str(method.input(), &request.payload, &self.deserialize_options)
            .map_err(|source| InvokeError::InvalidPayload {
                message: method.input().full_name().to_string(),
                source,
            })?;

        let deadline = request.deadline.or(self.default_deadline);

        tracing::debug!(
            method = method.full_name(),
            endpoint = %endpoint.key(),
            ?deadline,
            "invoking"
        );

        let mut client = GrpcClient::new(endpoint.service().clone());
        let response = client
            .unary(method.descriptor(), input, &request.headers, deadline)
            .await?
            .map_err(|status| {
                tracing::debug!(
                    method = method.full_name(),
                    code = ?status.code(),
                    "call failed"
                );
                InvokeError::Rpc(status)
            })?;

        let data = json::to_value(&response.message, &self.serialize_options)
            .map_err(InvokeError::InvalidResponse)?;

        tracing::debug!(method = method.full_name(), "call succeeded");

        Ok(InvokeResult {
            data,
            header: metadata::to_entries(&response.header),
            trailer: metadata::to_entries(&response.trailer),
        })
    }
}
