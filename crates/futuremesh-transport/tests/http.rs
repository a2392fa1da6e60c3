//! Integration tests for the reqwest-backed `HttpClient`.
//!
//! A minimal HTTP/1.1 responder on a loopback port stands in for the API:
//! it captures the raw request text and answers with a canned response.

#[cfg(feature = "http")]
mod http {
    use futuremesh_transport::{HttpClient, HttpRequest, ReqwestClient, TransportError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serves exactly one request. Returns the base URL and a receiver for
    /// the raw request (head + body) the server saw.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut stream).await;
            let _ = seen_tx.send(raw);

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        (format!("http://{addr}"), seen_rx)
    }

    /// Reads the request head, then as many body bytes as Content-Length says.
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let head_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending a full head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);

        while buf.len() < head_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_send_post_json_returns_status_and_body() {
        let (base, seen) = serve_once("200 OK", r#"{"access_token":"T1"}"#).await;
        let client = ReqwestClient::new();

        let request = HttpRequest::post(format!("{base}/api/login"))
            .json(&serde_json::json!({"email": "a@b.com", "password": "secret1"}))
            .unwrap()
            .header("Authorization", "Bearer T0");
        let response = client.send(request).await.expect("should get a response");

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["access_token"], "T1");

        let raw = seen.await.unwrap();
        assert!(raw.starts_with("POST /api/login HTTP/1.1"), "got: {raw}");
        let lower = raw.to_lowercase();
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains("authorization: bearer t0"));
        assert!(raw.ends_with(r#"{"email":"a@b.com","password":"secret1"}"#));
    }

    #[tokio::test]
    async fn test_send_error_status_is_not_a_transport_error() {
        let (base, _seen) = serve_once("401 UNAUTHORIZED", r#"{"error":"Invalid credentials"}"#).await;
        let client = ReqwestClient::new();

        let response = client
            .send(HttpRequest::get(format!("{base}/api/profile")))
            .await
            .expect("a 401 is still a response");

        assert_eq!(response.status, 401);
        assert!(response.is_unauthorized());
        assert!(response.text().contains("Invalid credentials"));
    }

    #[tokio::test]
    async fn test_send_to_closed_port_returns_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = ReqwestClient::new()
            .send(HttpRequest::get(format!("http://{addr}/api/profile")))
            .await;

        assert!(matches!(result, Err(TransportError::Network(_))));
    }

    #[tokio::test]
    async fn test_send_shared_through_arc() {
        let (base, _seen) = serve_once("204 No Content", "").await;
        let client = std::sync::Arc::new(ReqwestClient::new());

        let response = client
            .send(HttpRequest::delete(format!("{base}/api/anything")))
            .await
            .unwrap();

        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
    }
}
