use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// How the delivery endpoint answered a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint explicitly reported the code as sent.
    Confirmed,
    /// Any other 2xx JSON answer.
    Accepted,
}

#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, endpoint: &str, email: &str, code: &str)
    -> anyhow::Result<DeliveryOutcome>;
}

/// Delivers codes with a GET to `endpoint?email=..&otp=..`.
pub struct HttpOtpSender {
    client: reqwest::Client,
}

impl HttpOtpSender {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

pub fn classify(body: &Value) -> DeliveryOutcome {
    let confirmed = body.get("message").and_then(Value::as_str) == Some("OTP sent successfully")
        || body.get("status").and_then(Value::as_str) == Some("success");
    if confirmed {
        DeliveryOutcome::Confirmed
    } else {
        DeliveryOutcome::Accepted
    }
}

#[async_trait]
impl OtpSender for HttpOtpSender {
    async fn send(
        &self,
        endpoint: &str,
        email: &str,
        code: &str,
    ) -> anyhow::Result<DeliveryOutcome> {
        let response = self
            .client
            .get(endpoint)
            .query(&[("email", email), ("otp", code)])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Ok(classify(&body))
    }
}
