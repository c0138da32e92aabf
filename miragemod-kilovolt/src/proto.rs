// src/proto.rs
//
// Wire types for the Kilovolt protocol. Every frame is a JSON text message;
// client-to-server frames carry a command plus a correlation id, and
// server-to-client frames are tagged with a "type" discriminator.

use serde::{Deserialize, Serialize};

/// Client-to-server command frame.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub command: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

/// Server-to-client frame, discriminated by the `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once after the handshake; informational only.
    Hello {
        #[serde(default)]
        version: Option<String>,
    },
    Response(CommandResponse),
    Push(KeyPush),
}

/// Reply to a single command, matched to the caller by `request_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    pub request_id: String,
    pub ok: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Notification that a subscribed key changed.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyPush {
    pub key: String,
    pub new_value: String,
}

/// Challenge material returned by `klogin` when the broker has a password set.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_command_and_id() {
        let req = Request {
            command: "kget".to_string(),
            request_id: "abc".to_string(),
            data: json!({ "key": "mirage/figments" }),
        };
        let v: serde_json::Value = serde_json::from_str(&serde_json::to_string(&req).unwrap()).unwrap();
        assert_eq!(v["command"], "kget");
        assert_eq!(v["request_id"], "abc");
        assert_eq!(v["data"]["key"], "mirage/figments");
    }

    #[test]
    fn request_omits_null_data() {
        let req = Request {
            command: "klogin".to_string(),
            request_id: "abc".to_string(),
            data: serde_json::Value::Null,
        };
        let txt = serde_json::to_string(&req).unwrap();
        assert!(!txt.contains("data"));
    }

    #[test]
    fn server_message_decodes_response() {
        let txt = r#"{"type":"response","request_id":"r1","ok":true,"data":"{}"}"#;
        match serde_json::from_str::<ServerMessage>(txt).unwrap() {
            ServerMessage::Response(resp) => {
                assert!(resp.ok);
                assert_eq!(resp.request_id, "r1");
                assert_eq!(resp.data, Some(serde_json::Value::String("{}".into())));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn server_message_decodes_error_response() {
        let txt = r#"{"type":"response","request_id":"r2","ok":false,"error":"authentication required"}"#;
        match serde_json::from_str::<ServerMessage>(txt).unwrap() {
            ServerMessage::Response(resp) => {
                assert!(!resp.ok);
                assert_eq!(resp.error.as_deref(), Some("authentication required"));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn server_message_decodes_push() {
        let txt = r#"{"type":"push","key":"mirage/figments","new_value":"{\"u\":1}"}"#;
        match serde_json::from_str::<ServerMessage>(txt).unwrap() {
            ServerMessage::Push(push) => {
                assert_eq!(push.key, "mirage/figments");
                assert_eq!(push.new_value, "{\"u\":1}");
            }
            other => panic!("expected push, got {:?}", other),
        }
    }

    #[test]
    fn server_message_decodes_hello() {
        let txt = r#"{"type":"hello","version":"v9"}"#;
        match serde_json::from_str::<ServerMessage>(txt).unwrap() {
            ServerMessage::Hello { version } => assert_eq!(version.as_deref(), Some("v9")),
            other => panic!("expected hello, got {:?}", other),
        }
    }
}
