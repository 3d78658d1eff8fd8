use serde::{Deserialize, Serialize};

/// One action a chat bot is asked to perform.
///
/// This is also the JSON body posted by [`HttpChatBridge`](crate::chat::HttpChatBridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatAction {
    SendMessage { target: String, text: String },
    Unban { channel: String, mask: String },
    Unmute { channel: String, mask: String },
    Join { channel: String },
    Reconnect { network: String },
}

impl ChatAction {
    pub fn name(&self) -> &'static str {
        match self {
            ChatAction::SendMessage { .. } => "send_message",
            ChatAction::Unban { .. } => "unban",
            ChatAction::Unmute { .. } => "unmute",
            ChatAction::Join { .. } => "join",
            ChatAction::Reconnect { .. } => "reconnect",
        }
    }
}

/// Body returned by the bot's control endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeReply {
    #[serde(default)]
    pub ok: bool,
    /// Machine-readable reason when `ok` is false, e.g. `not_banned`.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_wire_shape() {
        let a = ChatAction::Unban {
            channel: "#ops".into(),
            mask: "*!*@spam.example".into(),
        };
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            json!({"action": "unban", "channel": "#ops", "mask": "*!*@spam.example"})
        );
        assert_eq!(a.name(), "unban");
    }

    #[test]
    fn reply_tolerates_missing_fields() {
        let r: BridgeReply = serde_json::from_str("{}").unwrap();
        assert!(!r.ok);
        assert!(r.error.is_none());
    }
}
