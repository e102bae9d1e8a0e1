//! TCP relay server
//!
//! Clients send one JSON audio message per line and receive one JSON reply
//! per line, in the order their messages arrived. Every connection feeds the
//! same [`RequestQueue`], so upstream calls stay serialized across clients.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::ports::Transcriber;
use crate::application::{JobError, JobHandle, RequestQueue};
use crate::domain::transcription::{normalize, AudioData};

/// Errors from the relay server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Server I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One reply line sent back to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Transcript { text: String },
    Error { message: String },
}

impl From<Result<String, JobError>> for Reply {
    fn from(result: Result<String, JobError>) -> Self {
        match result {
            Ok(text) => Reply::Transcript { text },
            Err(e) => Reply::Error {
                message: e.to_string(),
            },
        }
    }
}

/// A reply slot, kept in receive order
enum Pending {
    Ready(Reply),
    Waiting(JobHandle),
}

/// Line-delimited JSON relay in front of a request queue
pub struct RelayServer<T: Transcriber + 'static> {
    listener: TcpListener,
    queue: RequestQueue<T>,
}

impl<T: Transcriber + 'static> RelayServer<T> {
    /// Bind to `addr` (use port 0 for an ephemeral port)
    pub async fn bind(addr: &str, queue: RequestQueue<T>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self { listener, queue })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(addr = %self.local_addr()?, "Relay listening");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(pending = self.queue.len(), "Relay stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let queue = self.queue.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, queue).await {
                                warn!(%peer, error = %e, "Connection error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                },
            }
        }
    }
}

/// Read messages from one client and hand reply slots to its writer task
async fn handle_connection<T: Transcriber + 'static>(
    stream: TcpStream,
    peer: SocketAddr,
    queue: RequestQueue<T>,
) -> io::Result<()> {
    info!(%peer, "Client connected");

    let (reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_replies(writer, rx, peer));

    let mut lines = BufReader::new(reader).lines();
    let read_result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let pending = match parse_message(line) {
            Ok(audio) => {
                let handle = queue.enqueue(audio);
                debug!(%peer, job_id = %handle.id(), "Audio message queued");
                Pending::Waiting(handle)
            }
            Err(message) => {
                debug!(%peer, %message, "Rejected message");
                Pending::Ready(Reply::Error { message })
            }
        };

        if tx.send(pending).is_err() {
            break Ok(());
        }
    };

    // Closing the channel lets the writer finish the replies still owed
    drop(tx);
    info!(%peer, "Client disconnected");

    if let Err(e) = writer_task.await {
        warn!(%peer, error = %e, "Reply writer failed");
    }

    read_result
}

/// Write replies in slot order, waiting on each job as it comes up
async fn write_replies(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Pending>,
    peer: SocketAddr,
) {
    while let Some(pending) = rx.recv().await {
        let reply = match pending {
            Pending::Ready(reply) => reply,
            Pending::Waiting(handle) => Reply::from(handle.await),
        };

        let mut line = match serde_json::to_string(&reply) {
            Ok(line) => line,
            Err(e) => {
                error!(%peer, error = %e, "Failed to encode reply");
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = writer.write_all(line.as_bytes()).await {
            // Remaining handles are dropped here; their jobs still run
            debug!(%peer, error = %e, "Client gone, discarding replies");
            return;
        }
    }

    let _ = writer.shutdown().await;
}

/// Decode one line into audio, or the error text to send back
fn parse_message(line: &str) -> Result<AudioData, String> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| format!("Invalid message: {}", e))?;
    normalize(&value).map_err(|e| e.to_string())
}
