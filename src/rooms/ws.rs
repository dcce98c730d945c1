use std::collections::HashMap;

use axum::{
    debug_handler,
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::{auth::SocketUser, messages, users::User, AppError, AppResult, AppState};

use super::{channel, hub::{self, Frame}, ClientEvent, Hub, ServerEvent};

const OUTBOX: usize = 64;

#[debug_handler(state = AppState)]
pub async fn socket(
    State(db_pool): State<SqlitePool>,
    State(hub): State<Hub>,
    SocketUser(user): SocketUser,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(async move |stream| {
        info!(user = %user.username, "socket connected");
        let username = user.username.clone();
        serve(stream, db_pool, hub, user).await;
        info!(user = %username, "socket closed");
    })
}

struct Connection {
    db_pool: SqlitePool,
    hub: Hub,
    user: User,
    outbox: mpsc::Sender<Frame>,
    rooms: HashMap<String, JoinHandle<()>>,
}

/// Copies frames from a hub stream into the socket's outbox until either side goes away.
fn pump(mut rx: broadcast::Receiver<Frame>, outbox: mpsc::Sender<Frame>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    if outbox.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "socket fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn serve(stream: WebSocket, db_pool: SqlitePool, hub: Hub, user: User) {
    let (mut sink, mut incoming) = stream.split();
    let (outbox, mut outbox_rx) = mpsc::channel::<Frame>(OUTBOX);

    let mut forward_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if sink.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                break;
            }
        }
    });

    let personal = pump(hub.subscribe_user(user.id), outbox.clone());
    let mut conn = Connection { db_pool, hub, user, outbox, rooms: HashMap::new() };

    loop {
        tokio::select! {
            _ = &mut forward_task => break,
            msg = incoming.next() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    WsMessage::Text(text) => conn.receive(text.as_str()).await,
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    forward_task.abort();
    let pumps: Vec<_> = std::iter::once(personal).chain(conn.rooms.into_values()).collect();
    for pump in &pumps {
        pump.abort();
    }
    // a pump drops its receiver only once the aborted task has finished
    for pump in pumps {
        let _ = pump.await;
    }
    conn.hub.prune();
}

impl Connection {
    async fn receive(&mut self, text: &str) {
        let reply = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(event).await,
            Err(err) => Err(AppError::bad_request(format!("unreadable event: {err}"))),
        };

        let event = match reply {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(AppError::Internal(err)) => {
                error!("{err:?}");
                ServerEvent::Error { message: "internal server error".into() }
            }
            Err(err) => ServerEvent::Error { message: err.to_string() },
        };
        self.push(&event).await;
    }

    async fn push(&self, event: &ServerEvent) {
        if let Some(frame) = hub::encode(event) {
            let _ = self.outbox.send(frame).await;
        }
    }

    async fn handle(&mut self, event: ClientEvent) -> AppResult<Option<ServerEvent>> {
        match event {
            ClientEvent::JoinRoom { room } => {
                if !self.rooms.contains_key(&room) {
                    channel::require_channel(&self.db_pool, &room).await?;
                    let task = pump(self.hub.subscribe_room(&room), self.outbox.clone());
                    self.rooms.insert(room.clone(), task);
                }
                Ok(Some(ServerEvent::Joined { room }))
            }
            ClientEvent::LeaveRoom { room } => {
                if let Some(task) = self.rooms.remove(&room) {
                    task.abort();
                }
                Ok(Some(ServerEvent::Left { room }))
            }
            ClientEvent::SendMessage { room: Some(room), to: None, message } => {
                channel::post_to_channel(&self.db_pool, &self.hub, &self.user, &room, &message).await?;
                Ok(None)
            }
            ClientEvent::SendMessage { room: None, to: Some(to), message } => {
                messages::send_direct(&self.db_pool, &self.hub, &self.user, to, &message).await?;
                Ok(None)
            }
            ClientEvent::SendMessage { .. } => {
                Err(AppError::bad_request("send-message needs exactly one of `room` or `to`"))
            }
        }
    }
}
