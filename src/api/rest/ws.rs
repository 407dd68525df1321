use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::driver::DriverRecord;
use crate::state::AppState;

/// Live presence feed for one driver: the driver-screen subscription surface.
/// Sends the current snapshot on connect, then every snapshot the store fans
/// out, in write order.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, driver_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.store.subscribe(driver_id);
    let initial = state.store.get_driver(driver_id);

    info!(driver_id = %driver_id, "presence feed client connected");

    let send_task = tokio::spawn(async move {
        if let Some(snapshot) = initial {
            if send_snapshot(&mut sender, &snapshot).await.is_err() {
                return;
            }
        }

        while let Ok(snapshot) = rx.recv().await {
            if send_snapshot(&mut sender, &snapshot).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(driver_id = %driver_id, "presence feed client disconnected");
}

async fn send_snapshot(
    sender: &mut (impl SinkExt<Message> + Unpin),
    snapshot: &DriverRecord,
) -> Result<(), ()> {
    let json = match serde_json::to_string(snapshot) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize driver snapshot for ws");
            return Ok(());
        }
    };

    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
