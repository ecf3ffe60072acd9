use super::{EventStream, MessagingGateway};
use crate::error::GatewayError;
use crate::paginator::NavAction;
use crate::types::{ChatId, Command, Event, MessageHandle, Member};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Description the Bot API uses for a message that is no longer there.
/// "message can't be deleted" means the message exists but the bot lacks
/// the rights or the message is too old, which is a real failure.
const GONE_MARKER: &str = "message to delete not found";
const NOT_MODIFIED_MARKER: &str = "message is not modified";

/// Client for the Telegram Bot HTTP API.
pub struct TelegramGateway {
    client: reqwest::Client,
    api_url: String,
    token: String,
    poll_timeout: Duration,
}

impl TelegramGateway {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        poll_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        // Long polls hold the request open for `poll_timeout`.
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + request_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.without_url()))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            poll_timeout,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, GatewayError> {
        let url = format!("{}/bot{}/{}", self.api_url, self.token, method);
        // Strip the URL from transport errors, it contains the bot token.
        let response: ApiResponse<T> = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url()))?
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url()))?;
        response.into_result()
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<TgUpdate>, GatewayError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.poll_timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        navigation: &[NavAction],
    ) -> Result<MessageHandle, GatewayError> {
        let mut body = json!({
            "chat_id": chat,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        if !navigation.is_empty() {
            body["reply_markup"] = keyboard(navigation);
        }
        let message: TgMessage = self.call("sendMessage", body).await?;
        Ok(MessageHandle {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }

    async fn edit_message(
        &self,
        handle: MessageHandle,
        text: &str,
        navigation: &[NavAction],
    ) -> Result<(), GatewayError> {
        let body = json!({
            "chat_id": handle.chat_id,
            "message_id": handle.message_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
            "reply_markup": keyboard(navigation),
        });
        match self.call::<Value>("editMessageText", body).await {
            Ok(_) => Ok(()),
            Err(GatewayError::Api { description, .. }) if description.contains(NOT_MODIFIED_MARKER) => {
                debug!("Message {:?} already shows the requested page", handle);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_message(&self, handle: MessageHandle) -> Result<(), GatewayError> {
        let body = json!({
            "chat_id": handle.chat_id,
            "message_id": handle.message_id,
        });
        classify_delete(self.call::<Value>("deleteMessage", body).await)
    }

    async fn answer_action(&self, action_id: &str) -> Result<(), GatewayError> {
        self.call::<Value>("answerCallbackQuery", json!({ "callback_query_id": action_id }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl EventStream for TelegramGateway {
    async fn monitor(&self, event_tx: mpsc::Sender<Event>) -> Result<()> {
        let mut offset = 0;
        info!("Listening for Telegram updates...");
        loop {
            let updates = match self.get_updates(offset).await {
                Ok(u) => u,
                Err(e) => {
                    error!("Failed to fetch updates: {}. Retrying in 5s...", e);
                    sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(event) = update.into_event() else {
                    continue;
                };
                debug!("Inbound event: {:?}", event);
                if let Err(e) = event_tx.send(event).await {
                    error!("Failed to forward event: {}", e);
                    return Err(anyhow!("Channel closed"));
                }
            }
        }
    }
}

fn is_gone(description: &str) -> bool {
    description.contains(GONE_MARKER)
}

fn classify_delete(result: Result<Value, GatewayError>) -> Result<(), GatewayError> {
    match result {
        Ok(_) => Ok(()),
        Err(GatewayError::Api { description, .. }) if is_gone(&description) => {
            Err(GatewayError::AlreadyGone)
        }
        Err(e) => Err(e),
    }
}

fn keyboard(navigation: &[NavAction]) -> Value {
    let row: Vec<Value> = navigation
        .iter()
        .map(|a| json!({ "text": a.label, "callback_data": a.token.encode() }))
        .collect();
    if row.is_empty() {
        json!({ "inline_keyboard": [] })
    } else {
        json!({ "inline_keyboard": [row] })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, GatewayError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(GatewayError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
    callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    text: Option<String>,
    #[serde(default)]
    new_chat_members: Vec<TgUser>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: ChatId,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    username: Option<String>,
    #[serde(default)]
    first_name: String,
}

#[derive(Debug, Deserialize)]
struct TgCallbackQuery {
    id: String,
    message: Option<TgMessage>,
    data: Option<String>,
}

impl TgUpdate {
    fn into_event(self) -> Option<Event> {
        if let Some(query) = self.callback_query {
            let Some(message) = query.message else {
                warn!("Callback {} has no message attached, ignoring", query.id);
                return None;
            };
            return Some(Event::PageAction {
                action_id: query.id,
                message: MessageHandle {
                    chat_id: message.chat.id,
                    message_id: message.message_id,
                },
                token: query.data.unwrap_or_default(),
            });
        }

        let message = self.message?;
        if !message.new_chat_members.is_empty() {
            let members = message
                .new_chat_members
                .into_iter()
                .map(|u| Member {
                    username: u.username,
                    first_name: u.first_name,
                })
                .collect();
            return Some(Event::NewMembers {
                chat: message.chat.id,
                members,
            });
        }

        let command = Command::parse(message.text.as_deref()?)?;
        Some(Event::Command {
            chat: message.chat.id,
            command,
        })
    }
}
