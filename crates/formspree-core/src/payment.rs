//! Stripe payment confirmation with SCA challenges.
//!
//! Flow for one submission:
//!
//! 1. Ask the caller's [`CreatePaymentMethod`] for a payment method. On
//!    failure nothing is sent.
//! 2. Submit the form with `paymentMethod` appended.
//! 3. If the server answers `requiresAction` with a `resubmitKey` and a client
//!    secret, run the challenge through [`PaymentProvider::handle_card_action`].
//! 4. Resubmit with `paymentMethod`, `paymentIntent` and `resubmitKey`, and
//!    classify the answer exactly like step 2.
//!
//! Steps 3 and 4 repeat at most [`MAX_RESUBMISSIONS`] times.

use std::future::Future;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::client::RoundTrip;
use crate::constants::{
    MAX_RESUBMISSIONS, PAYMENT_INTENT_FIELD, PAYMENT_METHOD_FIELD, RESUBMIT_KEY_FIELD,
};
use crate::error::ClientError;
use crate::forms::{ErrorCode, FormError, SubmissionBody, SubmissionData, SubmissionResponse, SuccessBody};
use crate::utils::camelize_top_keys;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
}

/// Error reported by the payment provider (tokenization or SCA challenge).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

/// Client-side half of the payment provider, held by the [`crate::Client`].
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Run the SCA challenge for a payment intent.
    async fn handle_card_action(&self, client_secret: &str)
        -> Result<PaymentIntent, ProviderError>;
}

/// Per-submission callback that tokenizes the card details.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<PaymentMethod, ProviderError>>`.
#[async_trait]
pub trait CreatePaymentMethod: Send + Sync {
    async fn create_payment_method(&self) -> Result<PaymentMethod, ProviderError>;
}

#[async_trait]
impl<F, Fut> CreatePaymentMethod for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<PaymentMethod, ProviderError>> + Send + 'static,
{
    async fn create_payment_method(&self) -> Result<PaymentMethod, ProviderError> {
        self().await
    }
}

/// Decode `T`, or `None` when the value is `null` or has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Stripe descriptor nested in a payment-pending response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StripeChallenge {
    #[serde(default, deserialize_with = "lenient")]
    requires_action: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    payment_intent_client_secret: Option<String>,
    /// Informational; the intent id used on resubmission comes from the
    /// provider's challenge result.
    #[serde(default, deserialize_with = "lenient")]
    payment_intent_id: Option<String>,
}

/// Payment-pending response. `requiresAction` is accepted at the top level or
/// inside `stripe`. Each field decodes on its own so a malformed neighbour
/// never hides the server's `error`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    #[serde(default, deserialize_with = "lenient")]
    requires_action: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    resubmit_key: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    stripe: Option<StripeChallenge>,
    #[serde(default, deserialize_with = "lenient")]
    error: Option<Map<String, Value>>,
}

impl PaymentResponse {
    fn requires_action(&self) -> bool {
        self.requires_action.unwrap_or(false)
            || self
                .stripe
                .as_ref()
                .and_then(|s| s.requires_action)
                .unwrap_or(false)
    }

    fn client_secret(&self) -> Option<&str> {
        self.stripe
            .as_ref()
            .and_then(|s| s.payment_intent_client_secret.as_deref())
    }

    fn payment_intent_id(&self) -> Option<&str> {
        self.stripe
            .as_ref()
            .and_then(|s| s.payment_intent_id.as_deref())
    }

    /// The server's error as an error envelope carrying the object untouched.
    fn error_envelope(&self) -> Option<SubmissionBody> {
        let raw = self.error.as_ref()?;
        let typed = FormError::deserialize(&Value::Object(raw.clone())).unwrap_or_else(|_| {
            let message = raw.get("message").and_then(Value::as_str).unwrap_or_default();
            FormError::form(ErrorCode::Unspecified, message)
        });
        Some(SubmissionBody::server_error(typed, Value::Object(raw.clone())))
    }
}

/// Outcome of classifying one server response during the payment flow.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PaymentStep {
    RequiresAction {
        client_secret: String,
        resubmit_key: String,
    },
    /// Terminal; always an error envelope with a single error.
    Failed(SubmissionBody),
    /// No further payment action; the body is a normal envelope.
    Resolved(SubmissionBody),
}

fn protocol_error(message: &str) -> SubmissionBody {
    SubmissionBody::error(FormError::form(ErrorCode::Unspecified, message))
}

/// Camelize the top-level keys and the keys of `stripe`.
fn normalize(obj: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = camelize_top_keys(obj);
    if let Some(Value::Object(stripe)) = normalized.get("stripe") {
        let stripe = camelize_top_keys(stripe);
        normalized.insert("stripe".to_string(), Value::Object(stripe));
    }
    normalized
}

impl PaymentStep {
    pub(crate) fn classify(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Failed(protocol_error("unexpected payment response"));
        };
        let normalized = Value::Object(normalize(obj));
        let pending = match PaymentResponse::deserialize(&normalized) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::debug!(error = %e, "payment response did not decode");
                return Self::Failed(protocol_error("unexpected payment response"));
            }
        };

        if pending.requires_action() {
            if let (Some(key), Some(secret)) =
                (pending.resubmit_key.as_deref(), pending.client_secret())
            {
                tracing::debug!(
                    payment_intent = pending.payment_intent_id(),
                    "payment intent needs a challenge"
                );
                return Self::RequiresAction {
                    client_secret: secret.to_string(),
                    resubmit_key: key.to_string(),
                };
            }
        }

        if let Some(envelope) = pending.error_envelope() {
            return Self::Failed(envelope);
        }

        if pending.requires_action() {
            return Self::Failed(protocol_error(
                "payment requires action but no resubmit key or client secret was given",
            ));
        }

        match SubmissionBody::from_value(value.clone()) {
            SubmissionBody::Unrecognized(raw) => {
                let marked = normalized.get("ok") == Some(&Value::Bool(true))
                    || normalized.get("next").is_some_and(Value::is_string);
                match SuccessBody::deserialize(&raw) {
                    Ok(body) if marked => Self::Resolved(SubmissionBody::Success { body, raw }),
                    _ => Self::Failed(protocol_error("unexpected payment response")),
                }
            }
            envelope => Self::Resolved(envelope),
        }
    }
}

/// Drive the payment flow to a terminal result.
pub(crate) async fn confirm_payment(
    round_trip: &RoundTrip<'_>,
    provider: &dyn PaymentProvider,
    create_payment_method: &dyn CreatePaymentMethod,
    data: &SubmissionData,
) -> Result<SubmissionResponse, ClientError> {
    let payment_method = match create_payment_method.create_payment_method().await {
        Ok(method) => method,
        Err(e) => {
            tracing::warn!(form_key = round_trip.form_key(), error = %e, "payment method creation failed");
            return Ok(SubmissionResponse::failed(
                FormError::form(ErrorCode::StripeClientError, e.message),
                None,
            ));
        }
    };

    let mut request_data = data.with_field(PAYMENT_METHOD_FIELD, &payment_method.id);
    let mut resubmissions: u32 = 0;

    loop {
        let (meta, value) = round_trip.send(&request_data).await?;

        let (client_secret, resubmit_key) = match PaymentStep::classify(&value) {
            PaymentStep::Resolved(body) => {
                tracing::debug!(form_key = round_trip.form_key(), resubmissions, "payment flow resolved");
                return Ok(SubmissionResponse {
                    body,
                    response: Some(meta),
                });
            }
            PaymentStep::Failed(body) => {
                let code = body
                    .as_errors()
                    .and_then(|errors| errors.errors.first())
                    .and_then(|error| error.code.as_ref())
                    .map(|code| code.as_str().to_string());
                tracing::warn!(
                    form_key = round_trip.form_key(),
                    resubmissions,
                    code = code.as_deref(),
                    "payment flow failed"
                );
                return Ok(SubmissionResponse {
                    body,
                    response: Some(meta),
                });
            }
            PaymentStep::RequiresAction {
                client_secret,
                resubmit_key,
            } => (client_secret, resubmit_key),
        };

        if resubmissions >= MAX_RESUBMISSIONS {
            tracing::warn!(
                form_key = round_trip.form_key(),
                resubmissions,
                "giving up after too many SCA resubmissions"
            );
            return Ok(SubmissionResponse {
                body: protocol_error("too many payment confirmation attempts"),
                response: Some(meta),
            });
        }

        tracing::debug!(form_key = round_trip.form_key(), resubmissions, "payment requires action");
        let intent = match provider.handle_card_action(&client_secret).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(form_key = round_trip.form_key(), error = %e, "SCA challenge failed");
                return Ok(SubmissionResponse::failed(
                    FormError::form(ErrorCode::StripeScaError, e.message),
                    Some(meta),
                ));
            }
        };

        resubmissions += 1;
        request_data = data.with_fields([
            (PAYMENT_METHOD_FIELD, payment_method.id.as_str()),
            (PAYMENT_INTENT_FIELD, intent.id.as_str()),
            (RESUBMIT_KEY_FIELD, resubmit_key.as_str()),
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requires_action_nested() {
        let step = PaymentStep::classify(&json!({
            "resubmitKey": "abc",
            "stripe": { "requiresAction": true, "paymentIntentClientSecret": "pi_secret" }
        }));
        assert_eq!(
            step,
            PaymentStep::RequiresAction {
                client_secret: "pi_secret".to_string(),
                resubmit_key: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_requires_action_top_level_snake_case() {
        let step = PaymentStep::classify(&json!({
            "requires_action": true,
            "resubmit_key": "abc",
            "stripe": { "payment_intent_client_secret": "pi_secret" }
        }));
        assert!(matches!(step, PaymentStep::RequiresAction { ref resubmit_key, .. } if resubmit_key == "abc"));
    }

    #[test]
    fn test_requires_action_without_key_is_protocol_error() {
        let step = PaymentStep::classify(&json!({
            "resubmitKey": null,
            "stripe": { "requiresAction": true, "paymentIntentClientSecret": "pi_secret" }
        }));
        let PaymentStep::Failed(body) = step else {
            panic!("expected failure");
        };
        assert_eq!(body.as_errors().unwrap().errors[0].code, Some(ErrorCode::Unspecified));
    }

    #[test]
    fn test_server_error_is_terminal() {
        let step = PaymentStep::classify(&json!({
            "error": { "field": "paymentMethod", "code": "X", "message": "Y" },
            "resubmitKey": null,
            "stripe": { "requiresAction": false }
        }));
        let PaymentStep::Failed(body) = step else {
            panic!("expected failure");
        };
        let error = &body.as_errors().unwrap().errors[0];
        assert_eq!(error.field.as_deref(), Some("paymentMethod"));
        assert_eq!(error.code, Some(ErrorCode::Other("X".to_string())));
        assert_eq!(error.message, "Y");
        assert_eq!(
            body.to_value(),
            json!({ "errors": [{ "field": "paymentMethod", "code": "X", "message": "Y" }] })
        );
    }

    #[test]
    fn test_server_error_survives_null_stripe_fields() {
        let error = json!({
            "field": "paymentMethod",
            "code": "STRIPE_CLIENT_ERROR",
            "message": "Your card was declined."
        });
        let step = PaymentStep::classify(&json!({
            "error": error,
            "resubmitKey": null,
            "stripe": { "requiresAction": null, "paymentIntentClientSecret": null }
        }));
        let PaymentStep::Failed(body) = step else {
            panic!("expected failure");
        };
        assert_eq!(body.to_value(), json!({ "errors": [error] }));
        assert_eq!(
            body.as_errors().unwrap().errors[0].code,
            Some(ErrorCode::StripeClientError)
        );
    }

    #[test]
    fn test_server_error_wins_over_incomplete_challenge() {
        let step = PaymentStep::classify(&json!({
            "error": { "code": "STRIPE_CLIENT_ERROR", "message": "declined" },
            "requiresAction": true,
            "stripe": { "paymentIntentClientSecret": 42 }
        }));
        let PaymentStep::Failed(body) = step else {
            panic!("expected failure");
        };
        assert_eq!(body.as_errors().unwrap().errors[0].message, "declined");
    }

    #[test]
    fn test_payment_intent_id_does_not_change_the_challenge() {
        let step = PaymentStep::classify(&json!({
            "resubmitKey": "abc",
            "stripe": {
                "requiresAction": true,
                "paymentIntentClientSecret": "pi_secret",
                "paymentIntentId": "pi_1"
            }
        }));
        assert_eq!(
            step,
            PaymentStep::RequiresAction {
                client_secret: "pi_secret".to_string(),
                resubmit_key: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_envelopes_resolve() {
        let step = PaymentStep::classify(&json!({ "id": "sub_1", "data": {} }));
        assert!(matches!(step, PaymentStep::Resolved(SubmissionBody::Success { .. })));

        let step = PaymentStep::classify(&json!({ "errors": [{ "code": "EMPTY", "message": "empty" }] }));
        assert!(matches!(step, PaymentStep::Resolved(SubmissionBody::Error { .. })));
    }

    #[test]
    fn test_ok_marker_builds_success_envelope() {
        let step = PaymentStep::classify(&json!({ "ok": true, "next": "https://formspree.io/thanks" }));
        let PaymentStep::Resolved(SubmissionBody::Success { body, .. }) = step else {
            panic!("expected success");
        };
        assert_eq!(body.ok, Some(true));
        assert_eq!(body.next.as_deref(), Some("https://formspree.io/thanks"));
    }

    #[test]
    fn test_unknown_shape_is_protocol_error() {
        for raw in [json!({ "foo": "bar" }), json!("nope"), json!({ "ok": false })] {
            let PaymentStep::Failed(body) = PaymentStep::classify(&raw) else {
                panic!("expected failure for {raw}");
            };
            let error = &body.as_errors().unwrap().errors[0];
            assert_eq!(error.code, Some(ErrorCode::Unspecified));
            assert!(!error.is_field_error());
        }
    }
}
