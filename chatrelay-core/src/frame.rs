//! JSON wire frames of the chat protocol.
//!
//! # Inbound
//!
//! Clients send one flat JSON object per text message:
//!
//! ```text
//! { "init": true, "uuid": "aB3dE5gH7j", "channel": "42", "name": "Alice" }
//! { "uuid": "aB3dE5gH7j", "channel": "42", "name": "Alice", "message": "hi" }
//! ```
//!
//! [`InboundFrame`] reads these leniently: a field of the wrong JSON type is
//! treated as absent and unknown fields are ignored.
//!
//! # Outbound
//!
//! [`OutboundFrame`] has no public fields. Each constructor sets exactly the
//! fields its kind of frame carries, so nothing a client sends can leak into
//! what other clients receive unless the router copies it explicitly.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{Error, Result};

/// Notice sent to a connection whose identifier collided with a live client.
pub const RECONNECT_NOTICE: &str = "接続に失敗しました。ページを再読み込みしてください";

/// A frame received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InboundFrame {
    /// `true` only for the handshake frame.
    #[serde(deserialize_with = "lenient_bool")]
    pub init: bool,
    /// Identifier echoed back by the client.
    #[serde(deserialize_with = "lenient_string")]
    pub uuid: Option<String>,
    /// Alternate spelling of `uuid`.
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Target channel.
    #[serde(deserialize_with = "lenient_string")]
    pub channel: Option<String>,
    /// Display name.
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Chat text.
    #[serde(deserialize_with = "lenient_string")]
    pub message: Option<String>,
}

impl InboundFrame {
    /// Parses a text message.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if the text is not JSON, [`Error::Custom`] if it is
    /// JSON but not an object.
    pub fn parse(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            value @ Value::Object(_) => Ok(serde_json::from_value(value)?),
            _ => Err(Error::custom("frame is not a JSON object")),
        }
    }

    /// The client identifier, from `uuid` or else `id`, if non-empty.
    pub fn client_id(&self) -> Option<&str> {
        non_empty(self.uuid.as_deref()).or_else(|| non_empty(self.id.as_deref()))
    }

    /// The channel, if non-empty.
    pub fn channel(&self) -> Option<&str> {
        non_empty(self.channel.as_deref())
    }

    /// The chat text, if non-empty.
    pub fn message(&self) -> Option<&str> {
        non_empty(self.message.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

/// The `type` discriminator of an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Chat message, as seen by its sender.
    Mine,
    /// Chat message from someone else.
    Other,
    /// System notice.
    Info,
    /// Live member count of a channel.
    Headcount,
}

/// A frame sent to a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutboundFrame {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    init: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<FrameKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<String>,
}

impl OutboundFrame {
    /// Identifier assignment sent right after a connection opens.
    pub fn init_ack(id: &str) -> Self {
        Self {
            init: true,
            uuid: Some(id.to_string()),
            ..Self::default()
        }
    }

    /// A chat line, not yet addressed. See [`OutboundFrame::addressed_to`].
    pub fn chat(sender: &str, channel: &str, name: &str, message: &str, time: String) -> Self {
        Self {
            uuid: Some(sender.to_string()),
            channel: Some(channel.to_string()),
            name: Some(name.to_string()),
            message: Some(message.to_string()),
            time: Some(time),
            ..Self::default()
        }
    }

    /// Copy of a chat line marked `mine` or `other` for one recipient.
    pub fn addressed_to(&self, is_sender: bool) -> Self {
        Self {
            kind: Some(if is_sender {
                FrameKind::Mine
            } else {
                FrameKind::Other
            }),
            ..self.clone()
        }
    }

    /// A system notice.
    pub fn info(channel: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.map(str::to_string),
            message: Some(message.into()),
            kind: Some(FrameKind::Info),
            ..Self::default()
        }
    }

    /// Notice asking a rejected connection to reconnect.
    pub fn reconnect() -> Self {
        Self::info(None, RECONNECT_NOTICE)
    }

    /// Announces that `name` (`id`) entered `channel`.
    pub fn login_notice(channel: &str, name: &str, id: &str) -> Self {
        Self::info(Some(channel), format!("{name}さん({id})が入室しました！"))
    }

    /// Announces that `name` (`id`) left `channel`.
    pub fn logout_notice(channel: &str, name: &str, id: &str) -> Self {
        Self::info(Some(channel), format!("{name}さん({id})が退室しました"))
    }

    /// Live member count of `channel`.
    pub fn headcount(channel: &str, count: usize) -> Self {
        Self {
            channel: Some(channel.to_string()),
            kind: Some(FrameKind::Headcount),
            count: Some(count),
            ..Self::default()
        }
    }

    /// The `type` discriminator, if any.
    pub fn kind(&self) -> Option<FrameKind> {
        self.kind
    }

    /// The message text, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Current server time in RFC 3339, UTC.
pub fn server_timestamp() -> Result<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}
