//! Client synchronization layer - one WebSocket connection to the session server

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::ws::protocol::{ClientMsg, ServerMsg, Vec3};

use super::view::ViewState;

/// Kinematic report cadence, independent of the local simulation rate
pub const UPLOAD_INTERVAL: Duration = Duration::from_millis(50);

const OUTBOUND_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Connection closed")]
    Closed,

    #[error("Timed out waiting for server state")]
    Timeout,
}

/// Latest output of the local physics simulator
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KinematicSample {
    pub position: Vec3,
    pub velocity: Vec3,
}

pub struct SyncClient {
    state: Arc<RwLock<ViewState>>,
    outbound: mpsc::Sender<ClientMsg>,
    /// Bumped after every applied server message
    version: watch::Receiver<u64>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SyncClient {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _response) = connect_async(url).await?;
        info!(url = %url, "Connected to session server");

        let (mut ws_sink, mut ws_stream) = socket.split();
        let state = Arc::new(RwLock::new(ViewState::new()));
        let (version_tx, version) = watch::channel(0u64);
        let (outbound, mut outbound_rx) = mpsc::channel::<ClientMsg>(OUTBOUND_CAPACITY);

        // Writer task: outbound queue -> WebSocket
        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode client message");
                        continue;
                    }
                };
                if let Err(e) = ws_sink.send(Message::Text(json)).await {
                    debug!(error = %e, "WebSocket send failed");
                    break;
                }
            }
            let _ = ws_sink.close().await;
        });

        // Reader task: WebSocket -> view state
        let reader_state = state.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMsg>(&text) {
                        Ok(msg) => {
                            reader_state.write().apply(&msg);
                            version_tx.send_modify(|v| *v += 1);
                        }
                        Err(e) => warn!(error = %e, "Failed to parse server message"),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Server closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            state,
            outbound,
            version,
            reader,
            writer,
        })
    }

    pub async fn send(&self, msg: ClientMsg) -> Result<(), ClientError> {
        self.outbound.send(msg).await.map_err(|_| ClientError::Closed)
    }

    pub async fn join(&self, name: &str) -> Result<(), ClientError> {
        self.send(ClientMsg::Join {
            name: name.to_string(),
        })
        .await
    }

    /// Shared handle to the reconciled view
    pub fn state(&self) -> Arc<RwLock<ViewState>> {
        self.state.clone()
    }

    /// Copy of the current view
    pub fn view(&self) -> ViewState {
        self.state.read().clone()
    }

    /// Wait until `ready` holds for the view, re-checking after every server message
    pub async fn wait_for<F>(&mut self, limit: Duration, ready: F) -> Result<(), ClientError>
    where
        F: Fn(&ViewState) -> bool,
    {
        let wait = async {
            loop {
                if ready(&*self.state.read()) {
                    return Ok(());
                }
                if self.version.changed().await.is_err() {
                    return Err(ClientError::Closed);
                }
            }
        };
        timeout(limit, wait).await.map_err(|_| ClientError::Timeout)?
    }

    /// Report the latest local sample every `UPLOAD_INTERVAL` while we are alive in play
    pub fn spawn_uploader(&self, samples: watch::Receiver<KinematicSample>) -> JoinHandle<()> {
        spawn_uploader(
            self.state.clone(),
            self.outbound.clone(),
            samples,
            UPLOAD_INTERVAL,
        )
    }

    pub fn is_connected(&self) -> bool {
        !self.reader.is_finished()
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Which message, if any, to upload for this sample
fn next_upload(
    view: &ViewState,
    sample: KinematicSample,
    last_sent: Option<KinematicSample>,
) -> Option<ClientMsg> {
    if !view.is_local_alive_in_play() || last_sent == Some(sample) {
        return None;
    }
    Some(ClientMsg::Input {
        position: sample.position,
        velocity: sample.velocity,
    })
}

pub(crate) fn spawn_uploader(
    state: Arc<RwLock<ViewState>>,
    outbound: mpsc::Sender<ClientMsg>,
    samples: watch::Receiver<KinematicSample>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_sent = None;

        loop {
            ticker.tick().await;
            if samples.has_changed().is_err() {
                // simulator is gone
                break;
            }

            let sample = *samples.borrow();
            let next = {
                let view = state.read();
                next_upload(&view, sample, last_sent)
            };
            let Some(msg) = next else {
                continue;
            };
            if outbound.send(msg).await.is_err() {
                break;
            }
            last_sent = Some(sample);
        }
    })
}
