//! Event loop joining the stdio frames to the remote forwarder
//!
//! A single task owns the reader, the set of in-flight forwards and the
//! pending table. Each turn of the loop either accepts the next input frame
//! or finishes one forward, so reading request N+1 never waits on the reply
//! to request N. Replies are written as they arrive, which need not be
//! request order; each one carries its own correlation id.

use crate::error::Result;
use crate::pending::PendingRequests;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use mcp_client::{ForwardOutcome, Forwarder};
use mcp_server::{Frame, FrameReader, FrameWriter};
use mcp_types::{ErrorCode, ErrorObject, Inbound, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, Stdin, Stdout};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long in-flight requests may keep running after input closes.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub drain_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }
}

/// Counters reported when the bridge shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSummary {
    pub forwarded: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub malformed: usize,
    pub notifications: usize,
    pub abandoned: usize,
}

enum Completed {
    Request {
        request: JsonRpcRequest,
        outcome: mcp_client::Result<ForwardOutcome>,
    },
    Notification {
        method: String,
        result: mcp_client::Result<()>,
    },
}

type InFlight = FuturesUnordered<BoxFuture<'static, Completed>>;

pub struct Bridge {
    forwarder: Arc<dyn Forwarder>,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(forwarder: Arc<dyn Forwarder>, config: BridgeConfig) -> Self {
        Self { forwarder, config }
    }

    /// Serve the process's stdin/stdout until input closes.
    pub async fn run_stdio(&self) -> Result<BridgeSummary> {
        let (reader, writer): (FrameReader<Stdin>, FrameWriter<Stdout>) = mcp_server::stdio();
        self.run(reader, writer).await
    }

    /// Serve `reader` until it closes and in-flight work drains or is abandoned.
    ///
    /// Per-message failures become error responses; only a failure to write
    /// the output stream ends the loop with an error.
    pub async fn run<R, W>(
        &self,
        mut reader: FrameReader<R>,
        writer: FrameWriter<W>,
    ) -> Result<BridgeSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send,
    {
        let mut pending = PendingRequests::default();
        let mut in_flight: InFlight = FuturesUnordered::new();
        let mut summary = BridgeSummary::default();
        let mut input_open = true;

        // Armed once input closes.
        let drain = tokio::time::sleep(Duration::from_secs(86_400));
        tokio::pin!(drain);

        info!("Bridge ready - listening for MCP requests");

        loop {
            if !input_open && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                frame = reader.next_frame(), if input_open => match frame {
                    Some(frame) => {
                        self.accept(frame, &mut pending, &mut in_flight, &writer, &mut summary)
                            .await?;
                    }
                    None => {
                        input_open = false;
                        drain.as_mut().reset(Instant::now() + self.config.drain_timeout);
                        if !in_flight.is_empty() {
                            info!(
                                "Input closed, draining {} in-flight message(s) for up to {:?}",
                                in_flight.len(),
                                self.config.drain_timeout
                            );
                        }
                    }
                },
                Some(completed) = in_flight.next(), if !in_flight.is_empty() => {
                    self.complete(completed, &mut pending, &writer, &mut summary).await?;
                }
                _ = &mut drain, if !input_open => {
                    for (id, entry) in pending.drain() {
                        warn!(
                            "Abandoning {} (id {}) after {:?} without a reply",
                            entry.method,
                            id,
                            entry.elapsed()
                        );
                        summary.abandoned += 1;
                    }
                    break;
                }
            }
        }

        writer.shutdown().await?;

        info!(
            "Bridge stopped: {} forwarded, {} succeeded, {} failed, {} malformed, {} notifications, {} abandoned",
            summary.forwarded,
            summary.succeeded,
            summary.failed,
            summary.malformed,
            summary.notifications,
            summary.abandoned
        );
        Ok(summary)
    }

    async fn accept<W>(
        &self,
        frame: Frame,
        pending: &mut PendingRequests,
        in_flight: &mut InFlight,
        writer: &FrameWriter<W>,
        summary: &mut BridgeSummary,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match frame {
            Ok(Inbound::Request(request)) => {
                if !pending.insert(request.id.clone(), request.method.clone()) {
                    warn!("Rejecting {} (id {}): id already outstanding", request.method, request.id);
                    summary.malformed += 1;
                    let error = ErrorObject::new(ErrorCode::InvalidRequest, "Invalid request")
                        .with_data(json!(format!("id {} is already outstanding", request.id)));
                    writer
                        .write_error(request.jsonrpc.clone(), Some(request.id.clone()), error)
                        .await?;
                    return Ok(());
                }

                debug!("Forwarding {} (id {})", request.method, request.id);
                summary.forwarded += 1;
                in_flight.push(self.forward(request));
            }
            Ok(Inbound::Notification(notification)) => {
                debug!("Forwarding notification {}", notification.method);
                summary.notifications += 1;
                in_flight.push(self.notify(notification));
            }
            Err(malformed) => {
                warn!("Rejecting input line: {}", malformed);
                summary.malformed += 1;
                writer.write_response(&malformed.into_response()).await?;
            }
        }
        Ok(())
    }

    fn forward(&self, request: JsonRpcRequest) -> BoxFuture<'static, Completed> {
        let forwarder = Arc::clone(&self.forwarder);
        Box::pin(async move {
            let outcome = forwarder.forward(&request).await;
            Completed::Request { request, outcome }
        })
    }

    fn notify(&self, notification: JsonRpcNotification) -> BoxFuture<'static, Completed> {
        let forwarder = Arc::clone(&self.forwarder);
        Box::pin(async move {
            let result = forwarder.notify(&notification).await;
            Completed::Notification {
                method: notification.method,
                result,
            }
        })
    }

    async fn complete<W>(
        &self,
        completed: Completed,
        pending: &mut PendingRequests,
        writer: &FrameWriter<W>,
        summary: &mut BridgeSummary,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let (request, outcome) = match completed {
            Completed::Request { request, outcome } => (request, outcome),
            Completed::Notification { method, result } => {
                if let Err(e) = result {
                    warn!("Notification {} was not delivered: {}", method, e);
                }
                return Ok(());
            }
        };

        let Some(entry) = pending.remove(&request.id) else {
            debug!("Discarding reply for id {}: no longer pending", request.id);
            return Ok(());
        };

        let response = match outcome {
            Ok(ForwardOutcome::Result(result)) => {
                debug!("{} (id {}) answered in {:?}", entry.method, request.id, entry.elapsed());
                summary.succeeded += 1;
                JsonRpcResponse::success(&request, result)
            }
            Ok(ForwardOutcome::RemoteError(error)) => {
                debug!("{} (id {}) returned a remote error: {}", entry.method, request.id, error.message);
                summary.failed += 1;
                JsonRpcResponse::failure(request.jsonrpc.clone(), Some(request.id.clone()), error)
            }
            Err(e) => {
                warn!("{} (id {}) failed after {:?}: {}", entry.method, request.id, entry.elapsed(), e);
                summary.failed += 1;
                JsonRpcResponse::failure(
                    request.jsonrpc.clone(),
                    Some(request.id.clone()),
                    e.error_object(),
                )
            }
        };

        writer.write_response(&response).await?;
        Ok(())
    }
}
