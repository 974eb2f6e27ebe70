//! Routes a decoded notification to the gateway for its channel.

use std::sync::Arc;

use crate::{DeliveryChannel, EmailGateway, NotificationIntent, Result, SmsGateway};

/// Decodes message bodies and performs the delivery.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sms: Arc<dyn SmsGateway>,
    email: Arc<dyn EmailGateway>,
}

impl NotificationDispatcher {
    pub fn new(sms: Arc<dyn SmsGateway>, email: Arc<dyn EmailGateway>) -> Self {
        Self { sms, email }
    }

    /// Delivers one message body.
    ///
    /// Fails on malformed JSON, missing mandatory fields, an unknown type
    /// or a gateway error. Returns the intent that was delivered.
    pub async fn dispatch(&self, payload: &[u8]) -> Result<NotificationIntent> {
        let intent = NotificationIntent::from_wire(payload)?;
        intent.validate()?;

        match intent.channel()? {
            DeliveryChannel::Sms => self.sms.send_sms(&intent.to, &intent.message).await?,
            DeliveryChannel::Email => {
                let subject = intent.subject.as_deref().unwrap_or_default();
                self.email
                    .send_email(&intent.to, subject, &intent.message)
                    .await?
            }
        }

        Ok(intent)
    }
}
