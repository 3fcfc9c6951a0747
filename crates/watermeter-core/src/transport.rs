//! Contract with the external Zigbee transport

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use zcl_codec::{AttributeRecord, ProtocolError, ReportingRecord};

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Codec error: {0}")]
    Codec(#[from] ProtocolError),
}

/// Write attributes on one endpoint / cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub endpoint: u8,
    pub cluster: u16,
    pub attributes: Vec<AttributeRecord>,
}

/// Read attributes on one endpoint / cluster
///
/// The answer arrives later as a read response report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub endpoint: u8,
    pub cluster: u16,
    pub attributes: Vec<u16>,
}

impl ReadRequest {
    #[must_use]
    pub fn new(endpoint: u8, cluster: u16, attributes: &[u16]) -> Self {
        Self {
            endpoint,
            cluster,
            attributes: attributes.to_vec(),
        }
    }
}

/// Bind clusters of an endpoint to the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindRequest {
    pub endpoint: u8,
    pub clusters: Vec<u16>,
}

impl BindRequest {
    #[must_use]
    pub fn new(endpoint: u8, clusters: &[u16]) -> Self {
        Self {
            endpoint,
            clusters: clusters.to_vec(),
        }
    }
}

/// Periodic reporting subscription for one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub endpoint: u8,
    pub cluster: u16,
    #[serde(flatten)]
    pub record: ReportingRecord,
}

/// A ZCL frame received from a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub ieee_address: [u8; 8],
    pub endpoint: u8,
    pub cluster: u16,
    /// Raw ZCL bytes, header included
    pub data: Vec<u8>,
}

/// Completion of a single transport request
pub type TransportFuture = BoxFuture<'static, Result<(), TransportError>>;

/// Device I/O provided by the Zigbee stack
///
/// Requests are addressed by IEEE address and return a future that resolves
/// when the transport considers the request done (acknowledged, or merely
/// sent, depending on the stack). Retries and queuing are the transport's
/// business.
pub trait DeviceTransport: Send + Sync {
    fn write(&self, ieee_address: [u8; 8], request: WriteRequest) -> TransportFuture;

    fn read(&self, ieee_address: [u8; 8], request: ReadRequest) -> TransportFuture;

    fn bind(&self, ieee_address: [u8; 8], request: BindRequest) -> TransportFuture;

    fn configure_reporting(&self, ieee_address: [u8; 8], config: ReportingConfig)
        -> TransportFuture;
}

/// An issued command whose completion the caller may await, bound or drop
#[must_use = "a pending command does nothing unless awaited or detached"]
pub struct PendingCommand {
    inner: TransportFuture,
}

impl PendingCommand {
    pub fn new(inner: TransportFuture) -> Self {
        Self { inner }
    }

    /// A command with nothing left to do
    pub fn completed() -> Self {
        Self::new(futures::future::ready(Ok(())).boxed())
    }

    /// Run several requests in order, stopping at the first failure
    pub fn sequence(requests: Vec<TransportFuture>) -> Self {
        Self::new(
            async move {
                for request in requests {
                    request.await?;
                }
                Ok::<(), TransportError>(())
            }
            .boxed(),
        )
    }

    /// Await completion, giving up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`TransportError::Timeout`].
    pub async fn with_timeout(self, timeout: Duration) -> Result<(), TransportError> {
        tokio::time::timeout(timeout, self.inner)
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    /// Let the command finish in the background, logging failures
    pub fn detach(self, context: String) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.inner.await {
                tracing::warn!("{} failed: {}", context, e);
            }
        })
    }
}

impl Future for PendingCommand {
    type Output = Result<(), TransportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingCommand(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_completed() {
        assert_eq!(PendingCommand::completed().await, Ok(()));
    }

    #[tokio::test]
    async fn test_sequence_stops_at_failure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let step = |result: Result<(), TransportError>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                result
            }
            .boxed()
        };

        let pending = PendingCommand::sequence(vec![
            step(Ok(())),
            step(Err(TransportError::Rejected("read only".to_string()))),
            step(Ok(())),
        ]);
        assert!(matches!(pending.await, Err(TransportError::Rejected(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let pending = PendingCommand::new(futures::future::pending().boxed());
        let result = pending.with_timeout(Duration::from_secs(5)).await;
        assert_eq!(result, Err(TransportError::Timeout(Duration::from_secs(5))));
    }

    #[tokio::test]
    async fn test_detach() {
        let handle = PendingCommand::completed().detach("noop".to_string());
        handle.await.unwrap();
    }

    #[test]
    fn test_reporting_config_json() {
        let config = ReportingConfig {
            endpoint: 1,
            cluster: 0x0702,
            record: ReportingRecord {
                attribute: 0x0000,
                data_type: zcl_codec::DataType::Uint48,
                min_interval: 0,
                max_interval: 3600,
                reportable_change: 0,
            },
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["endpoint"], 1);
        assert_eq!(json["max_interval"], 3600);
        assert_eq!(json["data_type"], "uint48");
    }
}
