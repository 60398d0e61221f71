use serde::Deserialize;

use crate::error::ValidationError;

/// Untrusted request body as decoded from JSON. Every field is optional so
/// presence is checked by [`validate`] rather than by serde, keeping the
/// rejection body uniform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// A transaction that passed validation: `user_id` is non-empty and `amount`
/// is present. Optional fields pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPayload {
    pub user_id: String,
    pub amount: f64,
    pub merchant_id: Option<String>,
    pub location: Option<String>,
    pub currency: Option<String>,
}

/// Presence-only validation. No range check on `amount` and no currency-code
/// validation; a negative or zero amount passes through to downstream risk
/// scoring unchanged.
pub fn validate(raw: RawTransaction) -> Result<TransactionPayload, ValidationError> {
    let user_id = match raw.user_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(ValidationError::MissingField("userId")),
    };
    let amount = raw
        .amount
        .ok_or(ValidationError::MissingField("amount"))?;

    Ok(TransactionPayload {
        user_id,
        amount,
        merchant_id: raw.merchant_id,
        location: raw.location,
        currency: raw.currency,
    })
}
