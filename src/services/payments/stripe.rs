use anyhow::Context;
use async_trait::async_trait;

use super::{IntentStatus, PaymentIntent, PaymentProcessor};

pub struct StripeProvider {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeProvider {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeProvider {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> anyhow::Result<PaymentIntent> {
        let url = format!("{}/v1/payment_intents", self.api_base);

        let amount = amount_minor.to_string();
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), amount),
            ("currency".into(), currency.to_string()),
            ("payment_method_types[]".into(), "card".into()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value.to_string()));
        }

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .context("failed to call Stripe API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Stripe response")?;

        if !status.is_success() {
            anyhow::bail!("Stripe API error ({}): {}", status, data["error"]["message"]);
        }

        let id = data["id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing id in Stripe response"))?;
        let client_secret = data["client_secret"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing client_secret in Stripe response"))?;

        Ok(PaymentIntent {
            id: id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    async fn intent_status(&self, intent_id: &str) -> anyhow::Result<IntentStatus> {
        let url = format!("{}/v1/payment_intents/{intent_id}", self.api_base);

        let data: serde_json::Value = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to call Stripe API")?
            .error_for_status()
            .context("Stripe API returned error")?
            .json()
            .await
            .context("failed to parse Stripe response")?;

        data["status"]
            .as_str()
            .map(IntentStatus::parse)
            .ok_or_else(|| anyhow::anyhow!("missing status in Stripe response"))
    }
}
