use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    error::ChatError,
    types::{BridgeReply, ChatAction},
};

/// The handful of chat primitives task handlers need.
///
/// Implementations must be `Send + Sync` so one client can be shared by every
/// handler and driven from concurrent deliveries.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Stable lowercase identifier, used in logs.
    fn name(&self) -> &str;

    async fn send_message(&self, target: &str, text: &str) -> Result<(), ChatError>;

    /// Lift a ban. Returns [`ChatError::NotBanned`] when there is none.
    async fn unban(&self, channel: &str, mask: &str) -> Result<(), ChatError>;

    /// Lift a mute. Returns [`ChatError::NotMuted`] when there is none.
    async fn unmute(&self, channel: &str, mask: &str) -> Result<(), ChatError>;

    /// Join `channel`; already being joined is not an error.
    async fn join(&self, channel: &str) -> Result<(), ChatError>;

    async fn reconnect(&self, network: &str) -> Result<(), ChatError>;
}

/// Chat client that only logs what it would do.
///
/// Used when no bridge is configured, so the pipeline can run end to end
/// without a bot attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChat;

#[async_trait]
impl ChatClient for LogChat {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<(), ChatError> {
        info!(%target, %text, "chat: send_message");
        Ok(())
    }

    async fn unban(&self, channel: &str, mask: &str) -> Result<(), ChatError> {
        info!(%channel, %mask, "chat: unban");
        Ok(())
    }

    async fn unmute(&self, channel: &str, mask: &str) -> Result<(), ChatError> {
        info!(%channel, %mask, "chat: unmute");
        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<(), ChatError> {
        info!(%channel, "chat: join");
        Ok(())
    }

    async fn reconnect(&self, network: &str) -> Result<(), ChatError> {
        info!(%network, "chat: reconnect");
        Ok(())
    }
}

/// Posts each action as JSON to a bot's HTTP control endpoint.
pub struct HttpChatBridge {
    client: reqwest::Client,
    url: String,
}

impl HttpChatBridge {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, action: ChatAction) -> Result<(), ChatError> {
        debug!(url = %self.url, action = action.name(), "posting chat action");
        let resp = self.client.post(&self.url).json(&action).send().await?;

        let status = resp.status().as_u16();
        if resp.status().is_success() {
            return Ok(());
        }

        let reply: BridgeReply = resp.json().await.unwrap_or_default();
        match (reply.error.as_deref(), action) {
            (Some("not_banned"), ChatAction::Unban { channel, mask }) => {
                Err(ChatError::NotBanned { channel, mask })
            }
            (Some("not_muted"), ChatAction::Unmute { channel, mask }) => {
                Err(ChatError::NotMuted { channel, mask })
            }
            (error, action) => {
                let message = reply
                    .message
                    .or_else(|| error.map(str::to_string))
                    .unwrap_or_default();
                warn!(status, action = action.name(), %message, "chat bridge error");
                Err(ChatError::Rejected {
                    action: action.name(),
                    status,
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl ChatClient for HttpChatBridge {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<(), ChatError> {
        self.post(ChatAction::SendMessage {
            target: target.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn unban(&self, channel: &str, mask: &str) -> Result<(), ChatError> {
        self.post(ChatAction::Unban {
            channel: channel.to_string(),
            mask: mask.to_string(),
        })
        .await
    }

    async fn unmute(&self, channel: &str, mask: &str) -> Result<(), ChatError> {
        self.post(ChatAction::Unmute {
            channel: channel.to_string(),
            mask: mask.to_string(),
        })
        .await
    }

    async fn join(&self, channel: &str) -> Result<(), ChatError> {
        self.post(ChatAction::Join {
            channel: channel.to_string(),
        })
        .await
    }

    async fn reconnect(&self, network: &str) -> Result<(), ChatError> {
        self.post(ChatAction::Reconnect {
            network: network.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP request with a canned response and hand back the request body.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/actions", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let request = loop {
                let n = sock.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some((head, rest)) = text.split_once("\r\n\r\n") {
                    let len = head
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if rest.len() >= len || n == 0 {
                        break rest.to_string();
                    }
                }
                if n == 0 {
                    break String::new();
                }
            };
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            request
        });
        (url, handle)
    }

    #[tokio::test]
    async fn bridge_posts_action_json() {
        let (url, server) = one_shot_server("200 OK", r#"{"ok":true}"#).await;
        let bridge = HttpChatBridge::new(url, Duration::from_secs(5)).unwrap();
        bridge.send_message("#test", "hello").await.unwrap();

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"action": "send_message", "target": "#test", "text": "hello"})
        );
    }

    #[tokio::test]
    async fn bridge_maps_not_banned() {
        let (url, _server) =
            one_shot_server("409 Conflict", r#"{"ok":false,"error":"not_banned"}"#).await;
        let bridge = HttpChatBridge::new(url, Duration::from_secs(5)).unwrap();
        let err = bridge.unban("#ops", "*!*@x").await.unwrap_err();
        assert!(err.is_already_done(), "{err}");
    }

    #[tokio::test]
    async fn bridge_reports_other_failures() {
        let (url, _server) =
            one_shot_server("500 Internal Server Error", r#"{"ok":false,"message":"bot offline"}"#).await;
        let bridge = HttpChatBridge::new(url, Duration::from_secs(5)).unwrap();
        match bridge.join("#ops").await.unwrap_err() {
            ChatError::Rejected {
                action,
                status,
                message,
            } => {
                assert_eq!((action, status, message.as_str()), ("join", 500, "bot offline"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
