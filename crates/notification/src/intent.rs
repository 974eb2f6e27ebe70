//! The notification intent value object and its wire form.

use serde::{Deserialize, Serialize};

use crate::{NotificationError, Result};

/// Delivery channel selected by the intent's `type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryChannel {
    Sms,
    Email,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Sms => "sms",
            DeliveryChannel::Email => "email",
        }
    }
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending SMS or e-mail.
///
/// Wire form: `{"type": "sms"|"email", "to": "...", "subject"?: "...",
/// "message": "..."}`. The discriminator is kept as text so that an
/// unrecognised type still decodes and can be rejected as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    #[serde(rename = "type")]
    pub kind: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

impl NotificationIntent {
    /// An SMS to a phone number (MSISDN).
    pub fn sms(to: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: DeliveryChannel::Sms.as_str().to_string(),
            to: to.into(),
            subject: None,
            message: message.into(),
        }
    }

    /// A plain-text e-mail.
    pub fn email(
        to: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: DeliveryChannel::Email.as_str().to_string(),
            to: to.into(),
            subject: Some(subject.into()),
            message: message.into(),
        }
    }

    /// Resolves the delivery channel.
    pub fn channel(&self) -> Result<DeliveryChannel> {
        match self.kind.as_str() {
            "sms" => Ok(DeliveryChannel::Sms),
            "email" => Ok(DeliveryChannel::Email),
            other => Err(NotificationError::UnknownType(other.to_string())),
        }
    }

    /// Checks that type, recipient and message are all present.
    ///
    /// A missing e-mail subject is tolerated.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.kind.trim().is_empty() {
            missing.push("type");
        }
        if self.to.trim().is_empty() {
            missing.push("to");
        }
        if self.message.trim().is_empty() {
            missing.push("message");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::ValidationFailed(format!(
                "missing mandatory fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Serializes to the canonical JSON wire form.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a message body.
    pub fn from_wire(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}
