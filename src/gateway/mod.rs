use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::paginator::NavAction;
use crate::types::{ChatId, Event, MessageHandle};

pub mod telegram;
pub use telegram::TelegramGateway;

/// Outbound side of the chat transport.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Sends a Markdown message, optionally with navigation buttons.
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        navigation: &[NavAction],
    ) -> Result<MessageHandle, GatewayError>;

    /// Replaces the text and buttons of a previously sent message.
    async fn edit_message(
        &self,
        handle: MessageHandle,
        text: &str,
        navigation: &[NavAction],
    ) -> Result<(), GatewayError>;

    /// Fails with [`GatewayError::AlreadyGone`] when the message no longer exists.
    async fn delete_message(&self, handle: MessageHandle) -> Result<(), GatewayError>;

    /// Acknowledges a navigation button press.
    async fn answer_action(&self, action_id: &str) -> Result<(), GatewayError>;
}

/// Inbound side of the chat transport.
#[async_trait]
pub trait EventStream {
    /// Start receiving updates from the transport.
    /// Events should be sent to the provided channel.
    async fn monitor(&self, event_tx: mpsc::Sender<Event>) -> Result<()>;
}
