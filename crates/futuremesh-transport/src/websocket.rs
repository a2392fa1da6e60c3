//! WebSocket real-time link using `tokio-tungstenite`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::{LinkId, RealtimeLink, TransportError};

/// Counter for generating unique link IDs.
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// A client-side WebSocket connection carrying server push events.
///
/// The socket is owned by a background task. Incoming text frames are
/// forwarded on the channel returned by [`connect`](Self::connect); the
/// link itself only keeps a shutdown trigger, which is what makes
/// [`disconnect`](RealtimeLink::disconnect) synchronous. Dropping the link
/// also closes the socket.
pub struct WebSocketLink {
    id: LinkId,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    connected: Arc<AtomicBool>,
}

impl WebSocketLink {
    /// Opens a WebSocket to `url`, authenticating with `token` as a bearer
    /// credential on the upgrade request.
    ///
    /// Returns the link and the receiving end of the event channel.
    pub async fn connect(
        url: &str,
        token: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);

        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let id = LinkId::new(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed));
        let connected = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let task_connected = Arc::clone(&connected);
        let (mut sink, mut stream) = ws.split();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Fires on disconnect() and when the link is dropped.
                    _ = &mut shutdown_rx => {
                        let _ = sink.send(Message::Close(None)).await;
                        tracing::debug!(%id, "real-time link closed by client");
                        break;
                    }
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            // A dropped receiver just means nobody is listening.
                            let _ = events_tx.send(text.as_str().to_owned());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!(%id, "real-time link closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(%id, error = %e, "real-time link failed");
                            break;
                        }
                    },
                }
            }
            task_connected.store(false, Ordering::Release);
        });

        tracing::info!(%id, url, "real-time link connected");

        Ok((
            Self {
                id,
                shutdown: Mutex::new(Some(shutdown_tx)),
                connected,
            },
            events_rx,
        ))
    }
}

impl RealtimeLink for WebSocketLink {
    fn id(&self) -> LinkId {
        self.id
    }

    fn disconnect(&self) {
        let trigger = match self.shutdown.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = trigger {
            let _ = tx.send(());
        }
        self.connected.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
