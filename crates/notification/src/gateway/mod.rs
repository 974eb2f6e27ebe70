//! Delivery gateways: the external SMS and email providers.

mod email;
mod sms;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{NotificationError, Result};

pub use email::SmtpEmailGateway;
pub use sms::HttpSmsGateway;

/// Sends one SMS. Success means the provider accepted it.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, to: &str, message: &str) -> Result<()>;
}

/// Sends one plain-text email.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// An SMS recorded by [`InMemorySmsGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub to: String,
    pub message: String,
}

/// An email recorded by [`InMemoryEmailGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// In-memory SMS gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemorySmsGateway {
    sent: Arc<Mutex<Vec<SentSms>>>,
    fail_on_send: Arc<AtomicBool>,
}

impl InMemorySmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to refuse every message.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.fail_on_send.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl SmsGateway for InMemorySmsGateway {
    async fn send_sms(&self, to: &str, message: &str) -> Result<()> {
        if self.fail_on_send.load(Ordering::SeqCst) {
            return Err(NotificationError::Gateway {
                gateway: "sms",
                reason: "provider unavailable".to_string(),
            });
        }

        self.sent.lock().await.push(SentSms {
            to: to.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// In-memory email gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmailGateway {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    fail_on_send: Arc<AtomicBool>,
}

impl InMemoryEmailGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to refuse every message.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.fail_on_send.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailGateway for InMemoryEmailGateway {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.fail_on_send.load(Ordering::SeqCst) {
            return Err(NotificationError::Gateway {
                gateway: "email",
                reason: "relay unavailable".to_string(),
            });
        }

        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
