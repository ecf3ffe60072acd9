//! Data structures used throughout the bot.
//!
//! [`RawInstance`] is the record as published by a directory endpoint and
//! is deserialised with [`serde`](https://serde.rs/).  [`ServiceInstance`]
//! is the sanitised form produced by the aggregator and consumed by the
//! paginator.  [`Event`] is the transport-neutral view of an inbound
//! update, produced by an [`EventStream`](crate::gateway::EventStream)
//! and consumed by the dispatcher.

use serde::{Deserialize, Serialize};

pub type ChatId = i64;

/// A server record as published by a directory endpoint.
///
/// Only `name`, `url`, `by` and `by_url` are required.  Load metrics are
/// reported by monitored hosts only; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInstance {
    pub name: String,
    pub url: String,
    pub by: String,
    pub by_url: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_count: Option<u64>,
}

/// Which software a host runs.  Only affects the icon shown next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Standard,
    Alternate,
}

impl ServiceKind {
    /// Hosts that do not declare a type run the standard service.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None => ServiceKind::Standard,
            Some(t) if t.eq_ignore_ascii_case("jitsi") => ServiceKind::Standard,
            Some(_) => ServiceKind::Alternate,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            ServiceKind::Standard => "🖥",
            ServiceKind::Alternate => "🎓",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadMetrics {
    /// Fraction of CPU in use, `0.0..=1.0`.
    pub cpu_usage: f64,
    pub user_count: u64,
}

/// One advertised server, ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInstance {
    pub name: String,
    pub url: String,
    pub sponsor_name: String,
    pub sponsor_url: String,
    pub kind: ServiceKind,
    pub load_metrics: Option<LoadMetrics>,
}

/// Enough information to edit or delete a message after it was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub chat_id: ChatId,
    pub message_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Servers,
    Contribute,
    Info,
}

impl Command {
    /// Parses the first word of a message, e.g. `/servers` or
    /// `/servers@SomeBot`.  Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(Command::Start),
            "servers" => Some(Command::Servers),
            "contribute" => Some(Command::Contribute),
            "info" => Some(Command::Info),
            _ => None,
        }
    }
}

/// A user that just joined a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub username: Option<String>,
    pub first_name: String,
}

impl Member {
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.first_name)
    }
}

/// An inbound update the bot reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Command {
        chat: ChatId,
        command: Command,
    },
    NewMembers {
        chat: ChatId,
        members: Vec<Member>,
    },
    /// A navigation button was pressed on a previously sent listing.
    PageAction {
        action_id: String,
        message: MessageHandle,
        token: String,
    },
}
