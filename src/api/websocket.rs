//! WebSocket transport for live rounds
//!
//! One socket per player at `/ws/:player_id`. Client frames drive the round
//! engine; round events come back through `WsNotifier`, which routes them to
//! whichever connection the player currently holds.

use super::server::AppState;
use crate::common::traits::NotificationPort;
use crate::common::types::{HistoryRecord, PlayerId, RoundTicket, Wallet};
use crate::games::engine::StartRequest;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Frames sent by the player
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum ClientFrame {
    Start {
        bet: f64,
        #[serde(rename = "autoStop", default)]
        auto_stop: Option<f64>,
        #[serde(rename = "isReal", default)]
        is_real: bool,
    },
    Stop,
}

/// Frames pushed to the player
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum ServerFrame {
    Started {
        #[serde(rename = "roundId")]
        round_id: Uuid,
        #[serde(rename = "startedAt")]
        started_at: DateTime<Utc>,
    },
    /// The round ended at its crash point
    Crashed(HistoryRecord),
    /// The round was cashed out, manually or by auto-stop
    Stopped(HistoryRecord),
    Error {
        message: String,
    },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }
}

struct Connection {
    id: u64,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

/// Routes round notifications to live player connections
///
/// A player without a connection simply misses the push; the round itself
/// is unaffected.
#[derive(Default)]
pub struct WsNotifier {
    connections: DashMap<PlayerId, Connection>,
    next_id: AtomicU64,
}

impl WsNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection for `player_id`, replacing any previous one
    pub fn register(&self, player_id: &str) -> (u64, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if self
            .connections
            .insert(player_id.to_string(), Connection { id, tx })
            .is_some()
        {
            debug!("Replaced existing connection for player {}", player_id);
        }
        (id, rx)
    }

    /// Detach connection `id`; a newer connection for the same player is left alone
    pub fn unregister(&self, player_id: &str, id: u64) {
        self.connections.remove_if(player_id, |_, c| c.id == id);
    }

    pub fn send(&self, player_id: &str, frame: ServerFrame) -> bool {
        match self.connections.get(player_id) {
            Some(connection) => connection.tx.send(frame).is_ok(),
            None => {
                debug!("No live connection for player {}", player_id);
                false
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl NotificationPort for WsNotifier {
    fn send_started(&self, ticket: &RoundTicket) {
        self.send(
            &ticket.player_id,
            ServerFrame::Started {
                round_id: ticket.round_id,
                started_at: ticket.started_at,
            },
        );
    }

    fn send_resolved(&self, ticket: &RoundTicket, record: &HistoryRecord) {
        let frame = if record.is_win() {
            ServerFrame::Stopped(record.clone())
        } else {
            ServerFrame::Crashed(record.clone())
        };
        self.send(&ticket.player_id, frame);
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(player_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, player_id, state))
}

async fn handle_connection(socket: WebSocket, player_id: PlayerId, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut outbound) = state.notifier.register(&player_id);

    info!(
        "Player {} connected (connections: {})",
        player_id,
        state.notifier.connection_count()
    );

    let forward = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(&state, &player_id, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for player {}: {}", player_id, e);
                break;
            }
        }
    }

    state.notifier.unregister(&player_id, connection_id);
    forward.abort();

    info!("Player {} disconnected", player_id);
}

async fn handle_frame(state: &AppState, player_id: &str, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Malformed frame from {}: {}", player_id, e);
            state
                .notifier
                .send(player_id, ServerFrame::error(format!("Malformed frame: {}", e)));
            return;
        }
    };

    match frame {
        ClientFrame::Start {
            bet,
            auto_stop,
            is_real,
        } => {
            let request = StartRequest {
                player_id: player_id.to_string(),
                bet_amount: bet,
                auto_stop,
                wallet: Wallet::from_is_real(is_real),
            };
            if let Err(e) = state.engine.start(request).await {
                state.notifier.send(player_id, ServerFrame::error(e.to_string()));
            }
        }
        ClientFrame::Stop => match state.engine.stop(player_id).await {
            Ok(settlement) => {
                if let Err(e) = settlement.bookkeeping {
                    error!("Bookkeeping failed after stop for {}: {}", player_id, e);
                }
            }
            Err(e) => {
                state.notifier.send(player_id, ServerFrame::error(e.to_string()));
            }
        },
    }
}
