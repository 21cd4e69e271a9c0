use async_trait::async_trait;

/// Button layout attached to an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyboard {
    MainMenu,
    Search,
    Favorites,
    Profile,
    Settings,
    ProfileSetup,
    SexChoice,
    PreferredSexChoice,
}

/// A message to be delivered to an end user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub attachment: Option<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            attachment: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_attachment(mut self, attachment: Option<String>) -> Self {
        self.attachment = attachment;
        self
    }
}

/// Delivery of messages to end users.
///
/// Sends are not idempotent and are never retried; `false` means the message
/// was not delivered.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    async fn send(&self, user_id: i64, message: &OutboundMessage) -> bool;
}
