use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::EmailGateway;
use crate::{NotificationError, Result, SmtpConfig};

/// Email gateway that submits plain-text messages to an SMTP relay with
/// STARTTLS and PLAIN authentication.
pub struct SmtpEmailGateway {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpEmailGateway {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport,
            from: config.username.clone(),
        })
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message> {
        let from = self
            .from
            .parse()
            .map_err(|_| NotificationError::InvalidEmail(self.from.clone()))?;
        let to = to
            .parse()
            .map_err(|_| NotificationError::InvalidEmail(to.to_string()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotificationError::Gateway {
                gateway: "email",
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl EmailGateway for SmtpEmailGateway {
    #[tracing::instrument(skip(self, body))]
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(to, subject, body)?;
        self.transport.send(message).await?;
        tracing::info!("email accepted by relay");
        Ok(())
    }
}
