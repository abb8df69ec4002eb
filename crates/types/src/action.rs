use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Discriminant of a publish request
pub const ACTION_PUBLISH: &str = "PUBLISH";
/// Discriminant of a subscribe request
pub const ACTION_SUBSCRIBE: &str = "SUBSCRIBE";

/// Errors raised while encoding, decoding or validating an action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Malformed action: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("SUBSCRIPTION_MODE_AFTER requires an afterId")]
    MissingAfterId,
}

/// Envelope as it travels on the wire; `data` is decoded according to `actionType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub action_type: String,
    #[serde(default)]
    pub data: JsonValue,
}

/// Append `message` to `stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publish {
    pub stream: String,
    pub message: String,
}

/// Which part of a stream's history a new subscriber wants replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionMode {
    /// Only events published after the subscription
    #[serde(rename = "SUBSCRIPTION_MODE_NEW")]
    New,
    /// The whole history, then live events
    #[serde(rename = "SUBSCRIPTION_MODE_ALL")]
    All,
    /// History from position `afterId` onward, then live events
    #[serde(rename = "SUBSCRIPTION_MODE_AFTER")]
    After,
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionMode::New => write!(f, "SUBSCRIPTION_MODE_NEW"),
            SubscriptionMode::All => write!(f, "SUBSCRIPTION_MODE_ALL"),
            SubscriptionMode::After => write!(f, "SUBSCRIPTION_MODE_AFTER"),
        }
    }
}

/// Register for a stream, optionally replaying history first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscribe {
    pub stream: String,
    pub subscription_mode: SubscriptionMode,
    /// 0-based position into the stream's event list; only read for `After`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_id: Option<usize>,
}

impl Subscribe {
    /// Build a validated subscribe request.
    pub fn new(
        stream: impl Into<String>,
        subscription_mode: SubscriptionMode,
        after_id: Option<usize>,
    ) -> Result<Self, ActionError> {
        let subscribe = Self {
            stream: stream.into(),
            subscription_mode,
            after_id,
        };
        subscribe.start_at()?;
        Ok(subscribe)
    }

    /// Resolve the mode and cursor into a replay position.
    pub fn start_at(&self) -> Result<StartAt, ActionError> {
        match (self.subscription_mode, self.after_id) {
            (SubscriptionMode::New, _) => Ok(StartAt::New),
            (SubscriptionMode::All, _) => Ok(StartAt::All),
            (SubscriptionMode::After, Some(position)) => Ok(StartAt::After(position)),
            (SubscriptionMode::After, None) => Err(ActionError::MissingAfterId),
        }
    }
}

/// Validated replay position of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAt {
    New,
    All,
    /// Replay list positions `n..len`
    After(usize),
}

impl fmt::Display for StartAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartAt::New => write!(f, "new"),
            StartAt::All => write!(f, "all"),
            StartAt::After(position) => write!(f, "after({})", position),
        }
    }
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Publish(Publish),
    Subscribe(Subscribe),
}

impl Action {
    pub fn publish(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Action::Publish(Publish {
            stream: stream.into(),
            message: message.into(),
        })
    }

    pub fn subscribe(
        stream: impl Into<String>,
        mode: SubscriptionMode,
        after_id: Option<usize>,
    ) -> Result<Self, ActionError> {
        Subscribe::new(stream, mode, after_id).map(Action::Subscribe)
    }

    pub fn action_type(&self) -> &'static str {
        match self {
            Action::Publish(_) => ACTION_PUBLISH,
            Action::Subscribe(_) => ACTION_SUBSCRIBE,
        }
    }

    pub fn stream(&self) -> &str {
        match self {
            Action::Publish(publish) => &publish.stream,
            Action::Subscribe(subscribe) => &subscribe.stream,
        }
    }

    /// Decode one framed action. Subscribe payloads are validated here so the
    /// broker core never sees an `After` without a cursor.
    pub fn decode(bytes: &[u8]) -> Result<Self, ActionError> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        match envelope.action_type.as_str() {
            ACTION_PUBLISH => Ok(Action::Publish(serde_json::from_value(envelope.data)?)),
            ACTION_SUBSCRIBE => {
                let subscribe: Subscribe = serde_json::from_value(envelope.data)?;
                subscribe.start_at()?;
                Ok(Action::Subscribe(subscribe))
            }
            _ => Err(ActionError::UnknownAction(envelope.action_type)),
        }
    }

    /// Encode as a single JSON line, without the trailing newline.
    pub fn encode(&self) -> Result<String, ActionError> {
        let data = match self {
            Action::Publish(publish) => serde_json::to_value(publish)?,
            Action::Subscribe(subscribe) => serde_json::to_value(subscribe)?,
        };
        let envelope = Envelope {
            action_type: self.action_type().to_string(),
            data,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}
