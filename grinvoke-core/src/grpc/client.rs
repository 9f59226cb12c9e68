//! # Generic gRPC Client
//!
//! This module wraps a standard `tonic` client to provide a generic interface for
//! unary gRPC calls. It is agnostic to the specific Protobuf messages being exchanged.
//!
//! ## How it works
//!
//! The [`GrpcClient`] utilizes the [`super::codec::DynamicCodec`] to handle serialization.
//! It does not need to know the structure of the data it is sending; it builds the
//! HTTP/2 path (e.g., `/package.Service/Method`) at runtime from the `MethodDescriptor`
//! and lets the codec do the rest.
//!
//! ## Header and trailer metadata
//!
//! `tonic`'s own unary call merges response trailers into the response headers. To report
//! them separately the call is driven through the streaming machinery: the single response
//! message is read from the stream, then the trailers are read on their own.
use super::{
    codec::DynamicCodec,
    metadata::{self, MetadataError},
};
use crate::BoxError;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::{str::FromStr, time::Duration};
use tonic::{client::GrpcService, metadata::MetadataMap, transport::Channel};

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error(transparent)]
    InvalidMetadata(#[from] MetadataError),
}

/// The successful outcome of a unary call.
#[derive(Debug, Clone)]
pub struct UnaryResponse {
    pub message: DynamicMessage,
    /// Metadata received before the response message.
    pub header: MetadataMap,
    /// Metadata received after the response message.
    pub trailer: MetadataMap,
}

/// A generic client performing unary calls with runtime-typed messages.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }

    /// Performs a Unary gRPC call (Single Request -> Single Response).
    ///
    /// When `timeout` is set it is sent to the server as `grpc-timeout` and also enforced
    /// locally: once it elapses the in-flight call is dropped and `DEADLINE_EXCEEDED` is returned.
    ///
    /// # Returns
    /// * `Ok(Ok(UnaryResponse))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to build the request or the client was not ready.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        message: DynamicMessage,
        headers: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Result<UnaryResponse, tonic::Status>, GrpcRequestError> {
        let mut request = tonic::Request::new(message);
        *request.metadata_mut() = metadata::to_metadata_map(headers)?;
        if let Some(timeout) = timeout {
            request.set_timeout(timeout);
        }

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method);

        let call = async {
            self.client
                .ready()
                .await
                .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

            Ok::<_, GrpcRequestError>(self.call(request, path, codec).await)
        };

        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
                Ok(Err(tonic::Status::deadline_exceeded(format!(
                    "Deadline of {timeout:?} exceeded"
                ))))
            }),
            None => call.await,
        }
    }

    async fn call(
        &mut self,
        request: tonic::Request<DynamicMessage>,
        path: http::uri::PathAndQuery,
        codec: DynamicCodec,
    ) -> Result<UnaryResponse, tonic::Status> {
        let response = self.client.server_streaming(request, path, codec).await?;
        let (header, mut body, _) = response.into_parts();

        let message = body
            .message()
            .await?
            .ok_or_else(|| tonic::Status::internal("Missing response message."))?;
        let trailer = body.trailers().await?.unwrap_or_default();

        Ok(UnaryResponse {
            message,
            header,
            trailer,
        })
    }
}

fn http_path(method: &MethodDescriptor) -> http::uri::PathAndQuery {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path).expect("valid gRPC path")
}
