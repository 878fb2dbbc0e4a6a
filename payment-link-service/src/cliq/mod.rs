//! Zoho Cliq channel notifications: typed message payloads, the per-channel
//! webhook client and the message templates used across the service.

pub mod client;
pub mod templates;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use client::{ChannelTarget, CliqClient, NotifyError, ThreadPost, ThreadSeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CliqChannel {
    Project,
    Quote,
    Notification,
    Design,
    Accounts,
    Purchase,
    Sales,
    Installation,
    Production,
    Planning,
}

impl CliqChannel {
    pub const ALL: [CliqChannel; 10] = [
        CliqChannel::Project,
        CliqChannel::Quote,
        CliqChannel::Notification,
        CliqChannel::Design,
        CliqChannel::Accounts,
        CliqChannel::Purchase,
        CliqChannel::Sales,
        CliqChannel::Installation,
        CliqChannel::Production,
        CliqChannel::Planning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CliqChannel::Project => "Project",
            CliqChannel::Quote => "Quote",
            CliqChannel::Notification => "Notification",
            CliqChannel::Design => "Design",
            CliqChannel::Accounts => "Accounts",
            CliqChannel::Purchase => "Purchase",
            CliqChannel::Sales => "Sales",
            CliqChannel::Installation => "Installation",
            CliqChannel::Production => "Production",
            CliqChannel::Planning => "Planning",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Environment variable holding the channel's unique name.
    pub fn env_key(&self) -> String {
        format!("CLIQ_CHANNEL_{}", self.as_str().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CliqMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slides: Vec<Slide>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_title: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sync_message: bool,
}

impl CliqMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }

    pub fn card(title: impl Into<String>, theme: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            card: Some(Card { title: title.into(), theme: theme.to_string() }),
            ..Default::default()
        }
    }

    pub fn with_slide(mut self, slide: Slide) -> Self {
        self.slides.push(slide);
        self
    }

    pub fn with_button(mut self, label: &str, url: impl Into<String>) -> Self {
        self.buttons.push(Button::open_url(label, url));
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Card {
    pub title: String,
    pub theme: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Slide {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub data: TableData,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl Slide {
    /// Two-column `Field | Value` table.
    pub fn fields<K, V>(title: &str, rows: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|(k, v)| {
                BTreeMap::from([
                    ("Field".to_string(), k.into()),
                    ("Value".to_string(), v.into()),
                ])
            })
            .collect();
        Self {
            kind: "table".into(),
            title: title.into(),
            data: TableData { headers: vec!["Field".into(), "Value".into()], rows },
        }
    }

    pub fn single_column(title: &str, header: &str, value: impl Into<String>) -> Self {
        Self {
            kind: "table".into(),
            title: title.into(),
            data: TableData {
                headers: vec![header.to_string()],
                rows: vec![BTreeMap::from([(header.to_string(), value.into())])],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Button {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub action: ButtonAction,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ButtonAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: ButtonData,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ButtonData {
    pub web: String,
}

impl Button {
    pub fn open_url(label: &str, url: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            kind: "+".into(),
            action: ButtonAction { kind: "open.url".into(), data: ButtonData { web: url.into() } },
        }
    }
}
