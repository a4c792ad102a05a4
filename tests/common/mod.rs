//! Common test utilities - TatamidTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tatamid::{Config, Server};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Test harness that spawns a real tatamid server on a random port
pub struct TatamidTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl TatamidTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: addr,
            db_path: None, // In-memory for tests
            ..Config::default()
        };

        let server = Arc::new(Server::new(config).await?);
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a PATCH request with JSON body
    pub async fn patch<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .patch(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Register a team with a chosen ID
    pub async fn create_team(&self, id: &str) -> Result<Value> {
        let resp = self
            .post("/teams", &json!({ "id": id, "name": format!("Team {id}") }))
            .await?;
        anyhow::ensure!(resp.status() == 201, "team creation failed: {}", resp.status());
        Ok(resp.json().await?)
    }

    /// Register a male fighter and return its ID
    pub async fn create_fighter(&self, team_id: &str, name: &str, weight: &str) -> Result<String> {
        let resp = self
            .post(
                "/fighters",
                &json!({ "name": name, "sex": "M", "weight": weight, "team_id": team_id }),
            )
            .await?;
        anyhow::ensure!(resp.status() == 201, "fighter creation failed: {}", resp.status());
        let fighter: Value = resp.json().await?;
        Ok(fighter["id"].as_str().unwrap_or_default().to_string())
    }

    /// Create a combat and return its ID
    pub async fn create_combat(&self, red: &str, blue: &str) -> Result<String> {
        let resp = self
            .post("/combats", &json!({ "red": red, "blue": blue }))
            .await?;
        anyhow::ensure!(resp.status() == 201, "combat creation failed: {}", resp.status());
        let combat: Value = resp.json().await?;
        Ok(combat["id"].as_str().unwrap_or_default().to_string())
    }

    /// Post a scoring-table action
    pub async fn action(&self, combat_id: &str, action: Value) -> Result<reqwest::Response> {
        self.post(&format!("/combats/{combat_id}/actions"), &action)
            .await
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }

    /// Get the WebSocket URL for the server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connect to the WebSocket endpoint and return a test client
    pub async fn connect_ws(&self) -> Result<WsClient> {
        let (ws_stream, _) = connect_async(&self.ws_url()).await?;
        let (write, read) = ws_stream.split();
        Ok(WsClient { write, read })
    }
}

/// WebSocket client for testing
pub struct WsClient {
    write: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        Message,
    >,
    read: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

impl WsClient {
    /// Send a ping message
    pub async fn send_ping(&mut self) -> Result<()> {
        let msg = json!({ "type": "ping" });
        self.write
            .send(Message::Text(msg.to_string().into()))
            .await?;
        Ok(())
    }

    /// Receive the next message as JSON
    pub async fn recv_json(&mut self) -> Result<Value> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    anyhow::bail!("WebSocket closed");
                }
                _ => continue, // Skip binary/ping/pong frames
            }
        }
    }

    /// Receive with timeout
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<Value> {
        match tokio::time::timeout(timeout, self.recv_json()).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Skip messages until one matches
    pub async fn recv_matching(
        &mut self,
        timeout: Duration,
        pred: impl Fn(&Value) -> bool,
    ) -> Result<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let msg = self.recv_json_timeout(remaining).await?;
            if pred(&msg) {
                return Ok(msg);
            }
        }
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

impl Drop for TatamidTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
