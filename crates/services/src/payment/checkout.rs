use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::ports::{NewPaymentIntent, PaymentIntent, PaymentIntentStore};
use crate::UserId;

#[derive(Debug)]
pub enum CheckoutError {
    UnknownPlan(String),
    Storage(String),
}

impl fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPlan(plan) => write!(f, "Unknown credit pack: {}", plan),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for CheckoutError {}

/// Creates pending payment intents for one-time credit pack purchases.
/// The pack catalog is fixed at startup from configuration; the recorded
/// expected amount is what the provider's notification is later checked
/// against.
pub struct CheckoutService {
    intents: Arc<dyn PaymentIntentStore>,
    packs: HashMap<String, config::CreditPack>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        intents: Arc<dyn PaymentIntentStore>,
        packs: HashMap<String, config::CreditPack>,
        currency: String,
    ) -> Self {
        Self {
            intents,
            packs,
            currency,
        }
    }

    pub async fn create_checkout(
        &self,
        user_id: UserId,
        plan_id: &str,
    ) -> Result<PaymentIntent, CheckoutError> {
        let pack = self
            .packs
            .get(plan_id)
            .ok_or_else(|| CheckoutError::UnknownPlan(plan_id.to_string()))?;

        let order_id = format!("ord_{}", Uuid::new_v4().simple());
        let intent = self
            .intents
            .create_intent(NewPaymentIntent {
                order_id,
                user_id,
                plan_id: pack.id.clone(),
                expected_amount: pack.amount_minor,
                currency: self.currency.clone(),
                credits_to_grant: pack.credits,
            })
            .await
            .map_err(|e| CheckoutError::Storage(e.to_string()))?;

        tracing::info!(
            "Checkout created: user_id={}, order_id={}, plan_id={}, amount={} {}, credits={}",
            user_id,
            intent.order_id,
            intent.plan_id,
            intent.expected_amount,
            intent.currency,
            intent.credits_to_grant
        );
        Ok(intent)
    }
}
