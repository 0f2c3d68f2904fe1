//! Sender side of the relay.

use crate::common::config::SenderConfig;
use crate::ipc::messages::{Event, ACK_RESPONSE};
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Successful delivery: the listener closed the connection cleanly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Whether the listener wrote the `received` token before closing
    pub acknowledged: bool,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("timed out after {0:?} waiting for the listener")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl DeliveryError {
    /// Error kind for transport failures, e.g. `ConnectionRefused`
    pub fn code(&self) -> Option<io::ErrorKind> {
        match self {
            DeliveryError::Timeout(_) => None,
            DeliveryError::Transport(e) => Some(e.kind()),
        }
    }
}

/// Send one event and wait for the listener to close the connection.
///
/// The timeout covers connect, write and the wait for the peer's close.
/// When it expires the socket is dropped, which tears the connection down.
pub async fn send(
    host: &str,
    port: u16,
    event: &Event,
    timeout: Duration,
) -> Result<Delivered, DeliveryError> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, deliver(host, port, event)).await {
        Ok(Ok(acknowledged)) => Ok(Delivered {
            acknowledged,
            elapsed: started.elapsed(),
        }),
        Ok(Err(e)) => Err(DeliveryError::Transport(e)),
        Err(_) => Err(DeliveryError::Timeout(timeout)),
    }
}

/// Send using a resolved sender configuration
pub async fn send_with(config: &SenderConfig, event: &Event) -> Result<Delivered, DeliveryError> {
    send(&config.host, config.port, event, config.timeout).await
}

async fn deliver(host: &str, port: u16, event: &Event) -> io::Result<bool> {
    let mut stream = TcpStream::connect((host, port)).await?;
    tracing::debug!(%host, port, "connected to listener");

    stream.write_all(event.encode().as_bytes()).await?;
    // Half-close: the listener reads until EOF, then closes its side
    stream.shutdown().await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;

    Ok(response == ACK_RESPONSE.as_bytes())
}
