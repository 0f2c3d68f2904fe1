//! TCP listener for the notification relay.

use crate::common::config::{ListenerConfig, Volume};
use crate::daemon::compose::compose;
use crate::daemon::notifier::NotificationSink;
use crate::ipc::messages::Payload;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Interval of the "still listening" log line
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Relay server: accepts one event per connection and hands it to a sink
pub struct RelayServer<S> {
    config: ListenerConfig,
    sink: Arc<S>,
    start_time: Instant,
}

impl<S: NotificationSink> RelayServer<S> {
    /// Create a new relay server
    pub fn new(config: ListenerConfig, sink: S) -> Self {
        Self {
            config,
            sink: Arc::new(sink),
            start_time: Instant::now(),
        }
    }

    /// Acquire the listening socket
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.addr();
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Bind and serve until the process is stopped
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections forever. Each connection gets its own task, so a
    /// slow sender or renderer never holds up the accept loop.
    pub async fn serve(self, listener: TcpListener) {
        let port = listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(self.config.port);
        tracing::info!(port, volume = %self.config.volume, "listening");

        let start_time = self.start_time;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                tracing::info!(
                    port,
                    uptime_secs = start_time.elapsed().as_secs(),
                    "listening"
                );
            }
        });

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            tracing::debug!(%peer, "connection accepted");

            let sink = self.sink.clone();
            let volume = self.config.volume;
            let read_timeout = self.config.read_timeout;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, sink, volume, read_timeout).await {
                    // Dropping the stream here closes the socket
                    tracing::warn!(%peer, error = %e, "connection error");
                }
            });
        }
    }
}

/// Read one payload to EOF, answer, close, then dispatch in the background
async fn handle_connection<S: NotificationSink>(
    mut stream: TcpStream,
    sink: Arc<S>,
    volume: Volume,
    read_timeout: Option<Duration>,
) -> io::Result<()> {
    let raw = read_payload(&mut stream, read_timeout).await?;
    let payload = Payload::classify(&String::from_utf8_lossy(&raw));

    // The payload is complete at this point; a failed ack must not drop it
    if let Err(e) = acknowledge(&mut stream, payload.response()).await {
        tracing::warn!(error = %e, "failed to acknowledge sender");
    }
    drop(stream);

    let event = match payload {
        Payload::HttpProbe => {
            tracing::info!("HTTP request received, ignoring");
            return Ok(());
        }
        Payload::Empty => {
            tracing::debug!("empty payload, nothing to dispatch");
            return Ok(());
        }
        Payload::Event(event) => event,
    };

    tracing::info!(
        event_type = %event.event_type,
        session_id = %event.session_id,
        message = %event.message,
        "event received"
    );

    let notification = compose(&event, volume);
    tokio::spawn(async move {
        match sink.announce(&notification).await {
            Ok(()) => tracing::debug!(display = %notification.display, "notification dispatched"),
            Err(e) => tracing::error!(error = %e, "notification dispatch failed"),
        }
    });

    Ok(())
}

async fn acknowledge(stream: &mut TcpStream, response: &str) -> io::Result<()> {
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Read until EOF. With `idle_timeout`, give up only when no bytes arrive for
/// that long; a slow but steady sender is never cut off.
async fn read_payload(stream: &mut TcpStream, idle_timeout: Option<Duration>) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    let Some(limit) = idle_timeout else {
        stream.read_to_end(&mut raw).await?;
        return Ok(raw);
    };

    let mut buf = [0u8; 4096];
    loop {
        let n = tokio::time::timeout(limit, stream.read(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "sender went idle before closing"))??;
        if n == 0 {
            return Ok(raw);
        }
        raw.extend_from_slice(&buf[..n]);
    }
}
