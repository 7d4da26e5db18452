pub mod stripe;

use async_trait::async_trait;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    Canceled,
    Other(String),
}

impl IntentStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "succeeded" => IntentStatus::Succeeded,
            "processing" => IntentStatus::Processing,
            "requires_action" | "requires_payment_method" | "requires_confirmation" => {
                IntentStatus::RequiresAction
            }
            "canceled" => IntentStatus::Canceled,
            other => IntentStatus::Other(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> anyhow::Result<PaymentIntent>;

    async fn intent_status(&self, intent_id: &str) -> anyhow::Result<IntentStatus>;
}

/// Creates a payment intent for a strictly positive amount in minor units.
pub async fn create_intent(
    processor: &dyn PaymentProcessor,
    amount_minor: i64,
    currency: &str,
    metadata: &[(&str, &str)],
) -> Result<PaymentIntent, AppError> {
    if amount_minor <= 0 {
        return Err(AppError::Payment(format!(
            "amount must be a positive integer of minor units, got {amount_minor}"
        )));
    }

    processor
        .create_intent(amount_minor, currency, metadata)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, amount_minor, "payment intent creation failed");
            AppError::Payment("could not create payment intent".into())
        })
}

/// Asks the processor whether the intent behind a redirect actually succeeded.
pub async fn confirm_succeeded(
    processor: &dyn PaymentProcessor,
    intent_id: &str,
) -> Result<(), AppError> {
    let status = processor.intent_status(intent_id).await.map_err(|e| {
        tracing::error!(error = %e, intent_id, "payment intent lookup failed");
        AppError::Payment("could not verify payment".into())
    })?;

    match status {
        IntentStatus::Succeeded => Ok(()),
        other => Err(AppError::Payment(format!(
            "payment {intent_id} has not succeeded ({other:?})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingProcessor {
        calls: Mutex<Vec<i64>>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentProcessor for RecordingProcessor {
        async fn create_intent(
            &self,
            amount_minor: i64,
            _currency: &str,
            _metadata: &[(&str, &str)],
        ) -> anyhow::Result<PaymentIntent> {
            self.calls.lock().unwrap().push(amount_minor);
            if self.fail {
                anyhow::bail!("card network down");
            }
            Ok(PaymentIntent {
                id: "pi_1".to_string(),
                client_secret: "pi_1_secret".to_string(),
            })
        }

        async fn intent_status(&self, _intent_id: &str) -> anyhow::Result<IntentStatus> {
            Ok(IntentStatus::Processing)
        }
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let processor = RecordingProcessor {
            calls: Mutex::new(vec![]),
            fail: false,
        };
        let err = create_intent(&processor, 0, "eur", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));
        assert!(processor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_processor_failure_maps_to_payment_error() {
        let processor = RecordingProcessor {
            calls: Mutex::new(vec![]),
            fail: true,
        };
        let err = create_intent(&processor, 4200, "eur", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));
        assert_eq!(*processor.calls.lock().unwrap(), vec![4200]);
    }

    #[tokio::test]
    async fn test_unsettled_intent_is_not_confirmed() {
        let processor = RecordingProcessor {
            calls: Mutex::new(vec![]),
            fail: false,
        };
        assert!(confirm_succeeded(&processor, "pi_1").await.is_err());
    }

    #[test]
    fn test_intent_status_parse() {
        assert_eq!(IntentStatus::parse("succeeded"), IntentStatus::Succeeded);
        assert_eq!(
            IntentStatus::parse("requires_payment_method"),
            IntentStatus::RequiresAction
        );
        assert_eq!(
            IntentStatus::parse("mystery"),
            IntentStatus::Other("mystery".to_string())
        );
    }
}
