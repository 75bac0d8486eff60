//! WebSocket test client for protocol testing
//!
//! Provides both low-level WsConnection and high-level TestClient.
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Low-level WebSocket connection
pub struct WsConnection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WsConnection {
    /// Connect to the session endpoint for `user_id`
    pub async fn connect(addr: SocketAddr, user_id: Uuid) -> Self {
        let url = format!("ws://{}/api/ws/{}", addr, user_id);
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("Failed to connect");
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    /// Send raw text message
    pub async fn send_raw(&mut self, msg: &str) {
        self.sink
            .send(Message::Text(msg.to_string().into()))
            .await
            .unwrap();
    }

    /// Send JSON message
    pub async fn send_json<T: Serialize>(&mut self, msg: &T) {
        let json = serde_json::to_string(msg).unwrap();
        self.send_raw(&json).await;
    }

    /// Send a binary frame
    #[allow(dead_code)]
    pub async fn send_binary(&mut self, bytes: Vec<u8>) {
        self.sink.send(Message::Binary(bytes.into())).await.unwrap();
    }

    /// Receive raw text message
    pub async fn recv_raw(&mut self) -> String {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(Message::Ping(_))) => continue,
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed by server"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("WebSocket error: {}", e),
                None => panic!("WebSocket closed"),
            }
        }
    }

    /// Receive and deserialize JSON message
    pub async fn recv_json<T: DeserializeOwned>(&mut self) -> T {
        let text = self.recv_raw().await;
        serde_json::from_str(&text).expect("Failed to parse JSON")
    }

    /// Receive with timeout, returns None if timeout
    pub async fn recv_timeout(&mut self, duration: Duration) -> Option<String> {
        tokio::time::timeout(duration, self.recv_raw()).await.ok()
    }

    /// Wait until the server closes the connection
    #[allow(dead_code)]
    pub async fn expect_closed(&mut self) {
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "Server did not close the connection");
    }

    /// Close from the client side
    #[allow(dead_code)]
    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }
}

/// High-level test client with helper methods
pub struct TestClient {
    pub conn: WsConnection,
    pub user_id: Uuid,
}

impl TestClient {
    /// Connect as a fresh user
    #[allow(dead_code)]
    pub async fn connect(addr: SocketAddr) -> Self {
        Self::connect_as(addr, Uuid::new_v4()).await
    }

    /// Connect with a specific user id
    #[allow(dead_code)]
    pub async fn connect_as(addr: SocketAddr, user_id: Uuid) -> Self {
        let conn = WsConnection::connect(addr, user_id).await;
        Self { conn, user_id }
    }

    /// Announce a source texture with default generation parameters
    #[allow(dead_code)]
    pub async fn source_info(&mut self, width: u32, height: u32, handle: u64) {
        self.source_info_with_prompt(width, height, handle, "").await;
    }

    /// Announce a source texture with a prompt
    #[allow(dead_code)]
    pub async fn source_info_with_prompt(
        &mut self,
        width: u32,
        height: u32,
        handle: u64,
        prompt: &str,
    ) {
        self.conn
            .send_json(&json!({
                "status": "source_info",
                "width": width,
                "height": height,
                "handle": handle,
                "prompt": prompt,
                "negative_prompt": "",
                "steps": 2,
                "strength": 0.5,
                "guidance_scale": 1.2
            }))
            .await;
    }

    /// Receive the next message and assert its status
    #[allow(dead_code)]
    pub async fn expect_status(&mut self, status: &str) -> Value {
        let message: Value = tokio::time::timeout(Duration::from_secs(2), self.conn.recv_json())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for '{}'", status));
        assert_eq!(
            message["status"], status,
            "Expected '{}' but got: {}",
            status, message
        );
        message
    }

    /// Receive an `output_handle` message, returns (handle, width, height)
    #[allow(dead_code)]
    pub async fn expect_output_handle(&mut self) -> (u64, u64, u64) {
        let message = self.expect_status("output_handle").await;
        (
            message["handle"].as_u64().unwrap(),
            message["width"].as_u64().unwrap(),
            message["height"].as_u64().unwrap(),
        )
    }

    /// Receive an `error` message and return its code
    #[allow(dead_code)]
    pub async fn expect_error(&mut self) -> String {
        let message = self.expect_status("error").await;
        message["code"].as_str().unwrap().to_string()
    }
}
