use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::SmsGateway;
use crate::{NotificationError, Result, SmsConfig};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct SmsRequest<'a> {
    message: &'a str,
    msisdn: &'a str,
    sender_id: &'a str,
}

/// SMS gateway backed by the provider's HTTP API.
///
/// Every send first fetches a short-lived token with basic auth, then posts
/// the message with that token in the `api-key` header.
pub struct HttpSmsGateway {
    client: reqwest::Client,
    config: SmsConfig,
}

impl HttpSmsGateway {
    /// Builds the gateway with a client whose requests time out after the
    /// configured I/O timeout.
    pub fn new(config: SmsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn fetch_token(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.config.token_url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(NotificationError::Gateway {
                gateway: "sms",
                reason: format!("token request returned {status}"),
            });
        }

        let body: TokenResponse = response.json().await?;
        Ok(body.token)
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    #[tracing::instrument(skip(self, message))]
    async fn send_sms(&self, to: &str, message: &str) -> Result<()> {
        let token = self.fetch_token().await?;

        let response = self
            .client
            .post(&self.config.sms_url)
            .header("api-key", token)
            .json(&SmsRequest {
                message,
                msisdn: to,
                sender_id: &self.config.sender_id,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                tracing::info!("sms accepted by provider");
                Ok(())
            }
            status => Err(NotificationError::Gateway {
                gateway: "sms",
                reason: format!("send returned {status}"),
            }),
        }
    }
}
