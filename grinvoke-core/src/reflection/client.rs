//! # Reflection Client
//!
//! A `grpc.reflection.v1` client built around a single bidirectional stream.
//!
//! [`ReflectionClient::open`] starts a [`ReflectionSession`]. Every request of the session goes
//! over that one stream, and every file the server sends back lands in one shared set, so an
//! import used by several services (`google/protobuf/timestamp.proto`, say) crosses the wire once.
//!
//! The server answers requests in the order they were sent, one response per request. The
//! session relies on that to know when the import graph of a symbol has been fully drained.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use http_body::Body as HttpBody;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::{Streaming, client::GrpcService};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ReflectionResolveError {
    #[error(
        "Failed to open a reflection stream, the server might not support reflection: '{0}'"
    )]
    ServerStreamInitFailed(#[source] tonic::Status),

    #[error("The reflection stream failed with status: '{0}'")]
    ServerStreamFailure(#[source] tonic::Status),

    #[error("Reflection stream closed before every request was answered")]
    StreamClosed,

    #[error("Reflection stream no longer accepts requests")]
    SendFailed,

    #[error("Server returned reflection error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Expected a {expected} response, got: {got}")]
    UnexpectedResponseType { expected: &'static str, got: String },

    #[error("Failed to decode FileDescriptorProto: {0}")]
    DecodeError(#[from] prost::DecodeError),
}

/// Requests never name a virtual host.
const EMPTY_HOST: &str = "";

/// Requests that may be queued ahead of the server. Dependencies of a single file are queued at
/// once, so this only has to cover the widest import list.
const REQUEST_BUFFER: usize = 64;

/// A client for the gRPC Server Reflection Protocol.
#[derive(Debug, Clone)]
pub struct ReflectionClient<T = Channel> {
    client: ServerReflectionClient<T>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(channel: S) -> Self {
        let client = ServerReflectionClient::new(channel);
        Self { client }
    }

    /// Opens a reflection stream.
    ///
    /// Fails with [`ReflectionResolveError::ServerStreamInitFailed`] when the server has no
    /// reflection service.
    pub async fn open(&mut self) -> Result<ReflectionSession, ReflectionResolveError> {
        let (requests, rx) = mpsc::channel(REQUEST_BUFFER);

        let responses = self
            .client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ReflectionResolveError::ServerStreamInitFailed)?
            .into_inner();

        Ok(ReflectionSession {
            requests,
            responses,
            files: HashMap::new(),
            requested: HashSet::new(),
            sent: 0,
        })
    }
}

/// One open reflection stream and the files fetched through it so far.
///
/// Dropping the session closes the stream.
#[derive(Debug)]
pub struct ReflectionSession {
    requests: mpsc::Sender<ServerReflectionRequest>,
    responses: Streaming<ServerReflectionResponse>,
    files: HashMap<String, FileDescriptorProto>,
    requested: HashSet<String>,
    sent: usize,
}

impl ReflectionSession {
    /// Lists the fully qualified names of all services exposed by the server.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionResolveError> {
        self.send(MessageRequest::ListServices(String::new()))
            .await?;

        match self.next_response().await? {
            MessageResponse::ListServicesResponse(resp) => {
                let services: Vec<String> = resp.service.into_iter().map(|s| s.name).collect();
                tracing::debug!(count = services.len(), "listed services");
                Ok(services)
            }
            other => Err(unexpected("ListServices", &other)),
        }
    }

    /// Fetches the file defining `symbol` together with every file it imports, transitively.
    ///
    /// Files already fetched by this session are never requested again. A top-level symbol
    /// defined by one of them needs no request at all.
    pub async fn resolve_symbol(&mut self, symbol: &str) -> Result<(), ReflectionResolveError> {
        if self.files.values().any(|file| defines_symbol(file, symbol)) {
            tracing::debug!(symbol, "symbol already resolved");
            return Ok(());
        }

        tracing::debug!(symbol, "requesting file containing symbol");
        self.send(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await?;

        let mut pending = 1;
        while pending > 0 {
            let batch = match self.next_response().await? {
                MessageResponse::FileDescriptorResponse(res) => res.file_descriptor_proto,
                other => return Err(unexpected("FileDescriptor", &other)),
            };
            pending -= 1;

            for raw in batch {
                pending += self.admit(FileDescriptorProto::decode(raw.as_slice())?).await?;
            }
        }

        tracing::debug!(symbol, files = self.files.len(), "resolved symbol");
        Ok(())
    }

    /// Number of requests sent over this stream so far.
    pub fn requests_sent(&self) -> usize {
        self.sent
    }

    /// Every file fetched by this session, keyed by file name.
    pub fn files(&self) -> &HashMap<String, FileDescriptorProto> {
        &self.files
    }

    pub fn into_file_descriptor_set(self) -> FileDescriptorSet {
        FileDescriptorSet {
            file: self.files.into_values().collect(),
        }
    }

    /// Stores a file unless it is already known, and requests its unknown imports.
    ///
    /// Returns the number of requests sent.
    async fn admit(&mut self, file: FileDescriptorProto) -> Result<usize, ReflectionResolveError> {
        let name = file.name().to_string();
        if self.files.contains_key(&name) {
            return Ok(0);
        }

        let mut sent = 0;
        for dep in &file.dependency {
            if !self.files.contains_key(dep) && self.requested.insert(dep.clone()) {
                tracing::debug!(file = %dep, "requesting dependency");
                self.send(MessageRequest::FileByFilename(dep.clone()))
                    .await?;
                sent += 1;
            }
        }

        self.files.insert(name, file);
        Ok(sent)
    }

    async fn send(&mut self, request: MessageRequest) -> Result<(), ReflectionResolveError> {
        self.requests
            .send(ServerReflectionRequest {
                host: EMPTY_HOST.to_string(),
                message_request: Some(request),
            })
            .await
            .map_err(|_| ReflectionResolveError::SendFailed)?;
        self.sent += 1;
        Ok(())
    }

    async fn next_response(&mut self) -> Result<MessageResponse, ReflectionResolveError> {
        let response = self
            .responses
            .message()
            .await
            .map_err(ReflectionResolveError::ServerStreamFailure)?
            .ok_or(ReflectionResolveError::StreamClosed)?;

        match response.message_response {
            Some(MessageResponse::ErrorResponse(e)) => Err(ReflectionResolveError::ServerError {
                code: e.error_code,
                message: e.error_message,
            }),
            Some(message) => Ok(message),
            None => Err(ReflectionResolveError::UnexpectedResponseType {
                expected: "non-empty",
                got: "empty message".to_string(),
            }),
        }
    }
}

fn unexpected(expected: &'static str, got: &MessageResponse) -> ReflectionResolveError {
    ReflectionResolveError::UnexpectedResponseType {
        expected,
        got: format!("{got:?}"),
    }
}

/// Whether `file` declares `symbol` as a top-level service, message or enum.
fn defines_symbol(file: &FileDescriptorProto, symbol: &str) -> bool {
    let local = match file.package() {
        "" => symbol,
        package => match symbol
            .strip_prefix(package)
            .and_then(|rest| rest.strip_prefix('.'))
        {
            Some(local) => local,
            None => return false,
        },
    };

    file.service.iter().any(|s| s.name() == local)
        || file.message_type.iter().any(|m| m.name() == local)
        || file.enum_type.iter().any(|e| e.name() == local)
}

#[cfg(test)]
mod test {
    use super::*;
    use prost_types::{DescriptorProto, ServiceDescriptorProto};

    fn file(package: &str) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("demo.proto".to_string()),
            package: Some(package.to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Ping".to_string()),
                ..Default::default()
            }],
            service: vec![ServiceDescriptorProto {
                name: Some("Demo".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn top_level_symbols_are_found_by_full_name() {
        let file = file("demo.v1");

        assert!(defines_symbol(&file, "demo.v1.Demo"));
        assert!(defines_symbol(&file, "demo.v1.Ping"));
        assert!(!defines_symbol(&file, "demo.v1.Pong"));
        assert!(!defines_symbol(&file, "demo.v1beta.Demo"));
        assert!(!defines_symbol(&file, "Demo"));
    }

    #[test]
    fn files_without_package_match_bare_names() {
        let file = file("");

        assert!(defines_symbol(&file, "Demo"));
        assert!(!defines_symbol(&file, "demo.Demo"));
    }
}
