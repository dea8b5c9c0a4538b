//! Test helpers: a one-shot HTTP server standing in for the lookup API.

use std::time::Duration;

use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpListener,
    task::JoinHandle,
};

use crate::playerdb::PlayerDb;

/// A lookup client talking to a loopback server, bypassing any proxy set in the environment.
pub(crate) fn local_playerdb(endpoint: &str, timeout: Duration) -> PlayerDb {
    PlayerDb::with_client(endpoint, timeout, reqwest::Client::builder().no_proxy()).unwrap()
}

/// A successful PlayerDB answer, trimmed down to the fields the bot reads.
pub(crate) const PLAYER_FOUND: &str = r#"{
    "code": "player.found",
    "message": "Successfully found player by given ID.",
    "data": {
        "player": {
            "username": "Foo Bar",
            "id": "2535405290989971"
        }
    },
    "success": true
}"#;

/// Serves a single request on a loopback port, answering with `status` and `body` after `delay`.
///
/// Returns the endpoint to configure the client with, and a handle resolving to the request line
/// that was received.
pub(crate) async fn serve_once(
    status: u16,
    body: &'static str,
    delay: Duration,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        tokio::time::sleep(delay).await;

        let response = format!(
            "HTTP/1.1 {status} Whatever\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        // The client may have given up already.
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;

        String::from_utf8_lossy(&request)
            .lines()
            .next()
            .unwrap_or_default()
            .to_owned()
    });

    (format!("http://{addr}/api/player/xbox/"), handle)
}
