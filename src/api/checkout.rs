use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::{app_error::AppError, config::CheckoutConfig};

pub const PAYMENT_STATUS_PAID: &str = "paid";

/// Metadata key carrying the local order id through the gateway and back.
const METADATA_ORDER_ID: &str = "order_id";

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub amount_minor_units: i64,
    pub currency: String,
    pub customer_email: String,
    pub display_name: String,
    pub order_id: Uuid,
}

/// A freshly created hosted session; the client is redirected to `url`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSession {
    pub id: String,
    pub url: String,
}

/// Session details as reported by the gateway after an (attempted) payment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionDetails {
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Hosted-checkout operations the reconciliation flow depends on.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams) -> Result<CreatedSession>;
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails>;
}

/// Converts a major-unit amount to the gateway's minor units, rounding
/// half-up: 19.999 -> 2000, 5 -> 500.
pub fn to_minor_units(amount: f32) -> i64 {
    (amount as f64 * 100.0).round() as i64
}

/// What reconciliation needs from a session: present only when the session
/// is fully paid and carries the metadata this service attached at creation.
#[derive(Debug, Clone)]
pub struct PaidSession {
    pub order_id: Uuid,
    pub payment_intent_id: String,
    pub customer_email: Option<String>,
    pub amount: f32,
    pub currency: String,
}

/// Validates a retrieved session. Sessions created outside this service's
/// checkout flow lack the order metadata and are rejected here.
pub fn validate_paid_session(session: &SessionDetails) -> Result<PaidSession, AppError> {
    if session.payment_status != PAYMENT_STATUS_PAID {
        return Err(AppError::BadRequest("Payment not completed".into()));
    }

    let order_id = session
        .metadata
        .get(METADATA_ORDER_ID)
        .and_then(|raw| raw.parse::<Uuid>().ok());

    let (order_id, payment_intent_id) = match (order_id, session.payment_intent.clone()) {
        (Some(order_id), Some(intent)) => (order_id, intent),
        _ => return Err(AppError::BadRequest("Invalid payment metadata".into())),
    };

    Ok(PaidSession {
        order_id,
        payment_intent_id,
        customer_email: session.customer_email.clone(),
        amount: session.amount_total.unwrap_or(0) as f32 / 100.0,
        currency: session.currency.clone().unwrap_or_else(|| "usd".into()),
    })
}

/// Stripe-hosted checkout over the plain REST API.
pub struct StripeCheckout {
    client: Client,
    config: CheckoutConfig,
}

impl StripeCheckout {
    pub fn new(client: Client, config: CheckoutConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Deserialize)]
struct GatewayError {
    message: String,
}

#[derive(Deserialize)]
struct GatewayErrorBody {
    error: GatewayError,
}

async fn error_message(res: reqwest::Response, fallback: &str) -> String {
    res.json::<GatewayErrorBody>()
        .await
        .map(|body| body.error.message)
        .unwrap_or_else(|_| fallback.to_string())
}

#[async_trait]
impl CheckoutGateway for StripeCheckout {
    async fn create_session(&self, params: CreateSessionParams) -> Result<CreatedSession> {
        let amount = params.amount_minor_units.to_string();
        let order_id = params.order_id.to_string();
        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("success_url", &self.config.success_url),
            ("cancel_url", &self.config.cancel_url),
            ("customer_email", &params.customer_email),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", &params.currency),
            ("line_items[0][price_data][unit_amount]", &amount),
            (
                "line_items[0][price_data][product_data][name]",
                &params.display_name,
            ),
            ("metadata[order_id]", &order_id),
        ];

        let res = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("CheckoutGateway".into()))?;

        if !res.status().is_success() {
            return Err(anyhow!(
                error_message(res, "Checkout session could not be created").await
            ));
        }

        res.json()
            .await
            .context("Failed to parse checkout session response")
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails> {
        let res = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.config.api_base, session_id
            ))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("CheckoutGateway".into()))?;

        if !res.status().is_success() {
            return Err(anyhow!(
                error_message(res, "Checkout session could not be retrieved").await
            ));
        }

        res.json()
            .await
            .context("Failed to parse checkout session response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paid_session(order_id: &str, intent: Option<&str>) -> SessionDetails {
        let mut metadata = HashMap::new();
        metadata.insert(METADATA_ORDER_ID.to_string(), order_id.to_string());

        SessionDetails {
            payment_status: PAYMENT_STATUS_PAID.into(),
            customer_email: Some("reader@example.com".into()),
            payment_intent: intent.map(str::to_string),
            amount_total: Some(5000),
            currency: Some("usd".into()),
            metadata,
        }
    }

    #[test]
    fn minor_units_round_half_up() {
        assert_eq!(to_minor_units(19.999), 2000);
        assert_eq!(to_minor_units(5.0), 500);
        assert_eq!(to_minor_units(0.01), 1);
        assert_eq!(to_minor_units(10.004), 1000);
        assert_eq!(to_minor_units(0.0), 0);
    }

    #[test]
    fn unpaid_session_is_rejected() {
        let mut session = paid_session("5f0c82aa-4f1a-4bb1-9e4c-1f6f5ad07f8e", Some("pi_1"));
        session.payment_status = "unpaid".into();

        let err = validate_paid_session(&session).unwrap_err();
        assert_eq!(err.to_string(), "Payment not completed");
    }

    #[test]
    fn session_without_intent_is_rejected() {
        let session = paid_session("5f0c82aa-4f1a-4bb1-9e4c-1f6f5ad07f8e", None);

        let err = validate_paid_session(&session).unwrap_err();
        assert_eq!(err.to_string(), "Invalid payment metadata");
    }

    #[test]
    fn session_without_order_metadata_is_rejected() {
        let mut session = paid_session("5f0c82aa-4f1a-4bb1-9e4c-1f6f5ad07f8e", Some("pi_1"));
        session.metadata.clear();

        let err = validate_paid_session(&session).unwrap_err();
        assert_eq!(err.to_string(), "Invalid payment metadata");
    }

    #[test]
    fn session_with_garbled_order_id_is_rejected() {
        let session = paid_session("not-a-uuid", Some("pi_1"));

        let err = validate_paid_session(&session).unwrap_err();
        assert_eq!(err.to_string(), "Invalid payment metadata");
    }

    #[test]
    fn paid_session_is_extracted() {
        let session = paid_session("5f0c82aa-4f1a-4bb1-9e4c-1f6f5ad07f8e", Some("pi_1"));

        let paid = validate_paid_session(&session).unwrap();
        assert_eq!(
            paid.order_id.to_string(),
            "5f0c82aa-4f1a-4bb1-9e4c-1f6f5ad07f8e"
        );
        assert_eq!(paid.payment_intent_id, "pi_1");
        assert_eq!(paid.amount, 50.0);
        assert_eq!(paid.currency, "usd");
    }
}
