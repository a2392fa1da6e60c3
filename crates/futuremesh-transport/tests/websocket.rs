//! Integration tests for the WebSocket real-time link.
//!
//! These tests spin up a real WebSocket server on a loopback port and
//! connect a `WebSocketLink` to it, so the upgrade headers, frame
//! forwarding, and close handshake all go over an actual socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use futuremesh_transport::{RealtimeLink, WebSocketLink};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

    /// Binds a listener on a random port and returns it with its address.
    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_connect_sends_bearer_and_forwards_text_frames() {
        let (listener, addr) = listener().await;
        let (auth_tx, auth_rx) = oneshot::channel::<Option<String>>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_hdr_async(
                stream,
                move |req: &Request, resp: Response| {
                    let auth = req
                        .headers()
                        .get("Authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let _ = auth_tx.send(auth);
                    Ok(resp)
                },
            )
            .await
            .unwrap();
            ws.send(Message::text(r#"{"event":"new_notification"}"#))
                .await
                .unwrap();
            // Keep the socket open until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (link, mut events) = WebSocketLink::connect(&format!("ws://{addr}"), "T1")
            .await
            .expect("should connect");

        assert_eq!(auth_rx.await.unwrap().as_deref(), Some("Bearer T1"));
        assert!(link.is_connected());

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("should receive in time")
            .expect("channel open");
        assert_eq!(event, r#"{"event":"new_notification"}"#);
    }

    #[tokio::test]
    async fn test_disconnect_sends_close_frame() {
        let (listener, addr) = listener().await;
        let (closed_tx, closed_rx) = oneshot::channel::<bool>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut saw_close = false;
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    saw_close = true;
                    break;
                }
            }
            let _ = closed_tx.send(saw_close);
        });

        let (link, _events) = WebSocketLink::connect(&format!("ws://{addr}"), "T1")
            .await
            .expect("should connect");

        link.disconnect();
        assert!(!link.is_connected());

        let saw_close = tokio::time::timeout(Duration::from_secs(2), closed_rx)
            .await
            .expect("server should observe close in time")
            .unwrap();
        assert!(saw_close, "server should receive a Close frame");

        // Second call is a no-op.
        link.disconnect();
    }

    #[tokio::test]
    async fn test_server_close_marks_link_disconnected() {
        let (listener, addr) = listener().await;

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let (link, mut events) = WebSocketLink::connect(&format!("ws://{addr}"), "T1")
            .await
            .expect("should connect");

        // The event channel closes when the reader task exits.
        let next = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("reader task should exit in time");
        assert!(next.is_none());
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused_returns_network_error() {
        let (listener, addr) = listener().await;
        drop(listener);

        let result = WebSocketLink::connect(&format!("ws://{addr}"), "T1").await;

        assert!(matches!(
            result,
            Err(futuremesh_transport::TransportError::Network(_))
        ));
    }
}
