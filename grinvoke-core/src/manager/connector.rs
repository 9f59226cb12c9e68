//! # Connectors
//!
//! A [`Connector`] opens the channel the [`super::ConnectionManager`] keeps for an endpoint.
//! [`TcpConnector`] is the production implementation; tests plug in connectors that hand out
//! in-process services instead of sockets.
use crate::BoxError;
use std::{future::Future, time::Duration};
use tonic::transport::{Channel, Endpoint as TonicEndpoint};

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid address '{0}': {1}")]
    InvalidAddress(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] BoxError),
    #[error("Timed out after {1:?} connecting to '{0}'")]
    Timeout(String, Duration),
}

/// Opens a channel to `host:port`.
///
/// `timeout` is the budget of the attempt. The manager drops an attempt that outlives it and
/// reports [`ConnectError::Timeout`], so an implementation may use it as a hint.
pub trait Connector: Send + Sync {
    type Service: Clone + Send + Sync + 'static;

    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Service, ConnectError>> + Send;
}

/// Plaintext HTTP/2 channels over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Service = Channel;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Channel, ConnectError> {
        let addr = http_uri(host, port);

        let endpoint = TonicEndpoint::new(addr.clone())
            .map_err(|e| ConnectError::InvalidAddress(addr.clone(), e))?
            .connect_timeout(timeout);

        endpoint
            .connect()
            .await
            .map_err(|e| ConnectError::ConnectionFailed(addr, e.into()))
    }
}

fn http_uri(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{host}]:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}
