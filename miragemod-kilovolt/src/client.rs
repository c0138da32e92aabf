// src/client.rs

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::Sha256;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::ClientError;
use crate::proto::{AuthChallenge, CommandResponse, KeyPush, Request, ServerMessage};

/// Buffer size for each subscription's push channel.
const SUBSCRIPTION_BUFFER_SIZE: usize = 64;

type PendingMap = DashMap<String, oneshot::Sender<Result<serde_json::Value, ClientError>>>;
type SubscriptionMap = DashMap<String, Vec<mpsc::Sender<KeyPush>>>;

/// Connection options: an optional bearer token added to the websocket
/// handshake, and an optional broker password for challenge auth.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub auth_token: Option<String>,
    pub password: Option<String>,
}

/// Handle to a live Kilovolt connection.
///
/// Cheap to clone; all clones share the same socket. Commands are correlated
/// to responses by request id, pushes are fanned out to per-key subscribers.
#[derive(Clone)]
pub struct KilovoltClient {
    writer: mpsc::Sender<Message>,
    pending: Arc<PendingMap>,
    subscriptions: Arc<SubscriptionMap>,
}

impl KilovoltClient {
    /// Connects to the broker and, if a password is configured, completes the
    /// challenge-auth handshake before returning.
    pub async fn connect(endpoint: &str, options: ClientOptions) -> Result<Self, ClientError> {
        let mut request = normalize_endpoint(endpoint).into_client_request()?;
        if let Some(token) = options.auth_token.as_deref().filter(|t| !t.is_empty()) {
            request.headers_mut().insert(
                http::header::AUTHORIZATION,
                http::HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }

        let (ws, _) = connect_async(request).await?;
        let (mut sink, mut stream) = ws.split();

        let (writer_tx, mut writer_rx) = mpsc::channel::<Message>(SUBSCRIPTION_BUFFER_SIZE);
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let subscriptions: Arc<SubscriptionMap> = Arc::new(DashMap::new());

        // Writer task: serializes all outgoing frames onto the sink.
        tokio::spawn(async move {
            while let Some(msg) = writer_rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    error!("kilovolt write failed: {}", e);
                    break;
                }
            }
        });

        // Reader task: routes responses to waiting callers and pushes to
        // subscribers, until the socket closes.
        let reader_pending = Arc::clone(&pending);
        let reader_subs = Arc::clone(&subscriptions);
        let pong_tx = writer_tx.clone();
        tokio::spawn(async move {
            while let Some(msg_res) = stream.next().await {
                let msg = match msg_res {
                    Ok(m) => m,
                    Err(e) => {
                        error!("kilovolt read failed: {}", e);
                        break;
                    }
                };

                let txt = match msg {
                    Message::Close(_) => break,
                    Message::Ping(payload) => {
                        let _ = pong_tx.send(Message::Pong(payload)).await;
                        continue;
                    }
                    Message::Text(txt) => txt,
                    _ => continue,
                };

                let parsed = match serde_json::from_str::<ServerMessage>(txt.as_str()) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("dropping malformed broker frame: {}", e);
                        continue;
                    }
                };

                match parsed {
                    ServerMessage::Hello { version } => {
                        debug!("broker hello, version={:?}", version);
                    }
                    ServerMessage::Response(resp) => {
                        route_response(&reader_pending, resp);
                    }
                    ServerMessage::Push(push) => {
                        let senders = match reader_subs.get_mut(&push.key) {
                            Some(mut entry) => {
                                entry.retain(|tx| !tx.is_closed());
                                entry.clone()
                            }
                            None => continue,
                        };
                        for tx in senders {
                            let _ = tx.send(push.clone()).await;
                        }
                    }
                }
            }

            // Socket is gone: fail every in-flight command and drop all
            // subscription senders so receivers observe the end of stream.
            let waiting: Vec<String> = reader_pending.iter().map(|e| e.key().clone()).collect();
            for request_id in waiting {
                if let Some((_, tx)) = reader_pending.remove(&request_id) {
                    let _ = tx.send(Err(ClientError::ConnectionClosed));
                }
            }
            reader_subs.clear();
        });

        let client = Self {
            writer: writer_tx,
            pending,
            subscriptions,
        };

        if let Some(password) = options.password.as_deref().filter(|p| !p.is_empty()) {
            client.authenticate(password).await?;
        }

        Ok(client)
    }

    /// Reads a key as a raw string. Unset keys come back as the empty string.
    pub async fn get(&self, key: &str) -> Result<String, ClientError> {
        let data = self.send_command("kget", json!({ "key": key })).await?;
        match data {
            serde_json::Value::String(s) => Ok(s),
            other => Err(ClientError::UnexpectedResponse(other.to_string())),
        }
    }

    /// Reads a key and decodes its value as JSON. An empty value is reported
    /// as [`ClientError::EmptyKey`] so callers can distinguish "never written"
    /// from a decode failure.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, ClientError> {
        let raw = self.get(key).await?;
        if raw.is_empty() {
            return Err(ClientError::EmptyKey);
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes a raw string value to a key.
    pub async fn set(&self, key: &str, value: impl Into<String>) -> Result<(), ClientError> {
        self.send_command("kset", json!({ "key": key, "data": value.into() }))
            .await?;
        Ok(())
    }

    /// Serializes `value` as JSON and writes it to a key.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ClientError> {
        self.set(key, serde_json::to_string(value)?).await
    }

    /// Subscribes to change notifications for a key. Every write to the key
    /// is delivered as a [`KeyPush`] on the returned channel.
    pub async fn subscribe_key(&self, key: &str) -> Result<mpsc::Receiver<KeyPush>, ClientError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER_SIZE);
        self.subscriptions
            .entry(key.to_string())
            .or_default()
            .push(tx);
        self.send_command("ksub", json!({ "key": key })).await?;
        Ok(rx)
    }

    /// Stops change notifications for a key and drops its local subscribers.
    pub async fn unsubscribe_key(&self, key: &str) -> Result<(), ClientError> {
        self.send_command("kunsub", json!({ "key": key })).await?;
        self.subscriptions.remove(key);
        Ok(())
    }

    /// Challenge-response auth: `klogin` yields challenge material, `kauth`
    /// submits HMAC-SHA256(key = password ‖ salt, msg = challenge).
    async fn authenticate(&self, password: &str) -> Result<(), ClientError> {
        let data = self.send_command("klogin", serde_json::Value::Null).await?;
        let challenge: AuthChallenge = serde_json::from_value(data)
            .map_err(|e| ClientError::Auth(format!("bad challenge payload: {e}")))?;

        let challenge_bytes = BASE64
            .decode(&challenge.challenge)
            .map_err(|e| ClientError::Auth(format!("bad challenge encoding: {e}")))?;
        let salt_bytes = BASE64
            .decode(&challenge.salt)
            .map_err(|e| ClientError::Auth(format!("bad salt encoding: {e}")))?;

        let mut mac_key = password.as_bytes().to_vec();
        mac_key.extend_from_slice(&salt_bytes);
        let mut mac = Hmac::<Sha256>::new_from_slice(&mac_key)
            .map_err(|e| ClientError::Auth(e.to_string()))?;
        mac.update(&challenge_bytes);
        let hash = BASE64.encode(mac.finalize().into_bytes());

        self.send_command("kauth", json!({ "hash": hash }))
            .await
            .map_err(|e| match e {
                ClientError::Server(msg) => ClientError::Auth(msg),
                other => other,
            })?;
        Ok(())
    }

    async fn send_command(
        &self,
        command: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        let frame = Request {
            command: command.to_string(),
            request_id: request_id.clone(),
            data,
        };
        let txt = serde_json::to_string(&frame)?;
        if self.writer.send(Message::Text(txt.into())).await.is_err() {
            self.pending.remove(&request_id);
            return Err(ClientError::ConnectionClosed);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }
}

fn route_response(pending: &PendingMap, resp: CommandResponse) {
    let Some((_, tx)) = pending.remove(&resp.request_id) else {
        debug!("response for unknown request_id {}", resp.request_id);
        return;
    };
    let result = if resp.ok {
        Ok(resp.data.unwrap_or(serde_json::Value::Null))
    } else {
        Err(ClientError::Server(
            resp.error.unwrap_or_else(|| "unspecified error".to_string()),
        ))
    };
    let _ = tx.send(result);
}

/// Kilovolt deployments conventionally hand out http(s) endpoints; tungstenite
/// wants ws(s) schemes.
fn normalize_endpoint(endpoint: &str) -> String {
    if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = endpoint.strip_prefix("https://") {
        format!("wss://{rest}")
    } else {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_http_schemes() {
        assert_eq!(normalize_endpoint("http://localhost:4337/ws"), "ws://localhost:4337/ws");
        assert_eq!(normalize_endpoint("https://kv.example/ws"), "wss://kv.example/ws");
        assert_eq!(normalize_endpoint("ws://localhost:4337/ws"), "ws://localhost:4337/ws");
    }

    #[test]
    fn route_response_reports_server_error() {
        let pending: PendingMap = DashMap::new();
        let (tx, rx) = oneshot::channel();
        pending.insert("r1".to_string(), tx);

        route_response(
            &pending,
            CommandResponse {
                request_id: "r1".to_string(),
                ok: false,
                data: None,
                error: Some("authentication required".to_string()),
            },
        );

        match rx.blocking_recv() {
            Ok(Err(ClientError::Server(msg))) => assert_eq!(msg, "authentication required"),
            other => panic!("unexpected routing result: {:?}", other),
        }
    }
}
