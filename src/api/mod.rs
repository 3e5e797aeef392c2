//! Game API
//!
//! WebSocket endpoint for live rounds plus health, metrics and history reads.

pub mod server;
pub mod websocket;

pub use server::{create_router, AppState, GameServer};
pub use websocket::{ClientFrame, ServerFrame, WsNotifier};
