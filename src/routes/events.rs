use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Extension;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::realtime::{HubMessage, RealtimeHub, Transport};
use crate::state::AppState;

/// Unregisters the connection when the stream is dropped, which is how a
/// client-initiated disconnect reaches the hub.
struct Unregister {
    hub: Arc<RealtimeHub>,
    id: Uuid,
}

impl Drop for Unregister {
    fn drop(&mut self) {
        if self.hub.unregister(self.id) {
            debug!(connection_id = %self.id, "sse client disconnected");
        }
    }
}

/// Long-lived `text/event-stream` response. The first frame is always
/// `event: connected` carrying the assigned connection id, so clients have a
/// deterministic handshake to wait on; after that the stream relays hub
/// frames until the client goes away or the server shuts down.
pub async fn sse_events(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (id, mut rx) = state.hub.register(Transport::Sse);
    info!(request_id = %ctx.request_id, connection_id = %id, "sse client connected");

    let hub = state.hub.clone();
    let s = stream! {
        let _guard = Unregister { hub, id };

        let handshake = Event::default()
            .event("connected")
            .json_data(json!({ "connectionId": id }))
            .unwrap();
        yield Ok::<Event, Infallible>(handshake);

        while let Some(msg) = rx.recv().await {
            match msg {
                HubMessage::Frame(frame) => {
                    yield Ok(Event::default().event(&frame.event).data(&frame.data));
                }
                HubMessage::Close { reason } => {
                    let bye = Event::default()
                        .event("shutdown")
                        .json_data(json!({ "reason": reason }))
                        .unwrap();
                    yield Ok(bye);
                    break;
                }
            }
        }
    };

    Sse::new(s).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keepalive"),
    )
}
