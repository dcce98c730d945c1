mod channel;
mod hub;
mod ws;

use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{messages::Message, AppState};

pub use channel::{post_to_channel, Channel};
pub use hub::Hub;
pub use ws::socket;

/// Channel routes, mounted next to the direct-message routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels", get(channel::list).post(channel::create))
        .route("/channel/{room}", get(channel::history).post(channel::post))
}

/// Frames a socket client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom { room: String },
    LeaveRoom { room: String },
    SendMessage {
        room: Option<String>,
        to: Option<Uuid>,
        message: String,
    },
}

/// Frames the server pushes to sockets.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    ReceiveMessage { message: Message },
    Joined { room: String },
    Left { room: String },
    Error { message: String },
}
