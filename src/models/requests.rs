use serde::{Deserialize, Serialize};
use validator::Validate;

/// Event delivered by the VK Callback API
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CallbackEvent {
    #[validate(length(min = 1))]
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub object: Option<CallbackObject>,
}

/// Payload of a `message_new` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackObject {
    pub message: CallbackMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackMessage {
    pub from_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub payload: Option<String>,
}
