use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ports::{CompletionOutcome, FailOutcome, PaymentIntentStore};
use crate::ledger::CreditLedger;
use crate::signature::{BodySignature, FieldSignature};
use crate::subscription::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};
use crate::UserId;

/// One-time payment notification as delivered by the provider.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct OneTimeNotification {
    pub merchant_id: String,
    pub order_id: String,
    /// Charged amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub signature: String,
}

#[derive(Debug)]
pub enum ReconcileError {
    /// Signature check failed. Nothing was read or written.
    InvalidSignature,
    /// The payload could not be parsed after the signature passed.
    MalformedPayload(String),
    /// Storage failed while applying a verified notification. Callers
    /// must surface this as a retryable error so the provider redelivers.
    Storage(String),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "Invalid webhook signature"),
            Self::MalformedPayload(msg) => write!(f, "Malformed webhook payload: {}", msg),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for ReconcileError {}

/// Outcome of a verified one-time notification. Every variant is
/// acknowledged to the provider; redelivery only helps for storage
/// failures, which are errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneTimeOutcome {
    Granted { balance: i64 },
    /// The intent was already terminal. Redelivery, no-op.
    AlreadyProcessed,
    MarkedFailed,
    /// No intent matches the order id. Logged and acknowledged; there is
    /// nothing to credit.
    UnknownOrder,
    /// Amount or currency disagreed with the recorded intent. Logged and
    /// acknowledged without mutating anything.
    AmountMismatch,
}

/// Outcome of a verified subscription event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    Upserted,
    Canceled,
    /// Deletion or invoice for a subscription we never saw. Acknowledged;
    /// no phantom record is created.
    UnknownSubscription,
    GrantApplied { balance: i64 },
    /// Invoice already granted under its idempotency key.
    DuplicateInvoice,
    MarkedPastDue,
    /// Event type this service does not handle.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct SubscriptionEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: SubscriptionEventData,
}

#[derive(Debug, Deserialize)]
struct SubscriptionEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: String,
    metadata: SubscriptionMetadata,
    plan: String,
    status: String,
    current_period_start: i64,
    current_period_end: i64,
    #[serde(default)]
    cancel_at_period_end: bool,
}

#[derive(Debug, Deserialize)]
struct SubscriptionMetadata {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    id: String,
    subscription: String,
}

/// Applies verified provider notifications to local state. Signature
/// verification always runs first; an unverified payload never reaches
/// storage. All mutations go through idempotent store operations so
/// redelivered events converge instead of double-applying.
pub struct ReconciliationEngine {
    intents: Arc<dyn PaymentIntentStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    ledger: Arc<CreditLedger>,
    field_signature: FieldSignature,
    body_signature: BodySignature,
    merchant_id: String,
    plan_credits: HashMap<String, i64>,
}

impl ReconciliationEngine {
    pub fn new(
        intents: Arc<dyn PaymentIntentStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        ledger: Arc<CreditLedger>,
        field_signature: FieldSignature,
        body_signature: BodySignature,
        merchant_id: String,
        plan_credits: HashMap<String, i64>,
    ) -> Self {
        Self {
            intents,
            subscriptions,
            ledger,
            field_signature,
            body_signature,
            merchant_id,
            plan_credits,
        }
    }

    /// Handle a one-time payment notification end to end: verify the
    /// field signature, match the order to a recorded intent, cross-check
    /// amount and currency, then complete-and-grant or mark failed.
    pub async fn handle_one_time(
        &self,
        notification: &OneTimeNotification,
    ) -> Result<OneTimeOutcome, ReconcileError> {
        if !self.field_signature.verify(
            &notification.merchant_id,
            &notification.order_id,
            notification.amount,
            &notification.currency,
            &notification.status,
            &notification.signature,
        ) {
            tracing::warn!(
                "Rejected one-time notification (bad signature): order_id={}",
                notification.order_id
            );
            return Err(ReconcileError::InvalidSignature);
        }

        if notification.merchant_id != self.merchant_id {
            tracing::warn!(
                "Rejected one-time notification (wrong merchant): order_id={}, merchant_id={}",
                notification.order_id,
                notification.merchant_id
            );
            return Err(ReconcileError::InvalidSignature);
        }

        let intent = self
            .intents
            .get_intent(&notification.order_id)
            .await
            .map_err(|e| ReconcileError::Storage(e.to_string()))?;

        let Some(intent) = intent else {
            tracing::warn!(
                "One-time notification for unknown order: order_id={}",
                notification.order_id
            );
            return Ok(OneTimeOutcome::UnknownOrder);
        };

        if intent.status.is_terminal() {
            tracing::info!(
                "One-time notification redelivered for terminal intent: order_id={}, status={}",
                intent.order_id,
                intent.status
            );
            return Ok(OneTimeOutcome::AlreadyProcessed);
        }

        if notification.amount != intent.expected_amount
            || !notification.currency.eq_ignore_ascii_case(&intent.currency)
        {
            tracing::warn!(
                "One-time notification amount mismatch: order_id={}, got={} {}, expected={} {}",
                intent.order_id,
                notification.amount,
                notification.currency,
                intent.expected_amount,
                intent.currency
            );
            return Ok(OneTimeOutcome::AmountMismatch);
        }

        if notification.status == "success" {
            match self
                .intents
                .complete_and_grant(&intent.order_id)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Storage failure completing paid order, provider will retry: order_id={}, error={}",
                        intent.order_id,
                        e
                    );
                    ReconcileError::Storage(e.to_string())
                })? {
                CompletionOutcome::Completed { balance } => {
                    tracing::info!(
                        "Payment reconciled: order_id={}, user_id={}, credits={}, balance={}",
                        intent.order_id,
                        intent.user_id,
                        intent.credits_to_grant,
                        balance
                    );
                    Ok(OneTimeOutcome::Granted { balance })
                }
                CompletionOutcome::AlreadyTerminal(_) => Ok(OneTimeOutcome::AlreadyProcessed),
                CompletionOutcome::NotFound => Ok(OneTimeOutcome::UnknownOrder),
            }
        } else {
            match self
                .intents
                .mark_failed(&intent.order_id)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?
            {
                FailOutcome::Failed => {
                    tracing::info!(
                        "Payment failed at provider: order_id={}, status={}",
                        intent.order_id,
                        notification.status
                    );
                    Ok(OneTimeOutcome::MarkedFailed)
                }
                FailOutcome::AlreadyTerminal(_) => Ok(OneTimeOutcome::AlreadyProcessed),
                FailOutcome::NotFound => Ok(OneTimeOutcome::UnknownOrder),
            }
        }
    }

    /// Handle a subscription webhook. The signature covers the raw body,
    /// so verification happens before any parsing.
    pub async fn handle_subscription(
        &self,
        raw_body: &str,
        signature_header: &str,
    ) -> Result<SubscriptionOutcome, ReconcileError> {
        if !self.body_signature.verify(raw_body, signature_header) {
            tracing::warn!("Rejected subscription webhook (bad signature)");
            return Err(ReconcileError::InvalidSignature);
        }

        let event: SubscriptionEvent = serde_json::from_str(raw_body)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        tracing::info!(
            "Subscription webhook received: event_id={}, type={}",
            event.id,
            event.event_type
        );

        match event.event_type.as_str() {
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.upsert_subscription(event.data.object).await
            }
            "customer.subscription.deleted" => {
                self.cancel_subscription(event.data.object).await
            }
            "invoice.payment_succeeded" => self.apply_invoice(event.data.object).await,
            "invoice.payment_failed" => self.mark_past_due(event.data.object).await,
            other => {
                tracing::info!("Ignoring unhandled subscription event type: {}", other);
                Ok(SubscriptionOutcome::Ignored(other.to_string()))
            }
        }
    }

    async fn upsert_subscription(
        &self,
        object: serde_json::Value,
    ) -> Result<SubscriptionOutcome, ReconcileError> {
        let object: SubscriptionObject = serde_json::from_value(object)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        let status = match object.status.as_str() {
            "active" | "trialing" => SubscriptionStatus::Active,
            "past_due" | "unpaid" => SubscriptionStatus::PastDue,
            _ => SubscriptionStatus::Canceled,
        };

        let now = Utc::now();
        let record = SubscriptionRecord {
            provider_subscription_id: object.id.clone(),
            user_id: object.metadata.user_id,
            provider_customer_id: object.customer,
            plan: object.plan,
            status,
            current_period_start: unix_to_datetime(object.current_period_start),
            current_period_end: unix_to_datetime(object.current_period_end),
            cancel_at_period_end: object.cancel_at_period_end,
            created_at: now,
            updated_at: now,
        };

        self.subscriptions
            .upsert(record)
            .await
            .map_err(|e| ReconcileError::Storage(e.to_string()))?;

        tracing::info!(
            "Subscription upserted: subscription_id={}, status={}",
            object.id,
            status
        );
        Ok(SubscriptionOutcome::Upserted)
    }

    async fn cancel_subscription(
        &self,
        object: serde_json::Value,
    ) -> Result<SubscriptionOutcome, ReconcileError> {
        let object: SubscriptionObject = serde_json::from_value(object)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        let updated = self
            .subscriptions
            .set_status(&object.id, SubscriptionStatus::Canceled)
            .await
            .map_err(|e| ReconcileError::Storage(e.to_string()))?;

        if updated {
            tracing::info!("Subscription canceled: subscription_id={}", object.id);
            Ok(SubscriptionOutcome::Canceled)
        } else {
            tracing::warn!(
                "Deletion event for unknown subscription: subscription_id={}",
                object.id
            );
            Ok(SubscriptionOutcome::UnknownSubscription)
        }
    }

    async fn apply_invoice(
        &self,
        object: serde_json::Value,
    ) -> Result<SubscriptionOutcome, ReconcileError> {
        let invoice: InvoiceObject = serde_json::from_value(object)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        let subscription = self
            .subscriptions
            .get(&invoice.subscription)
            .await
            .map_err(|e| ReconcileError::Storage(e.to_string()))?;

        let Some(subscription) = subscription else {
            tracing::warn!(
                "Paid invoice for unknown subscription: invoice_id={}, subscription_id={}",
                invoice.id,
                invoice.subscription
            );
            return Ok(SubscriptionOutcome::UnknownSubscription);
        };

        let Some(&credits) = self.plan_credits.get(&subscription.plan) else {
            tracing::warn!(
                "Paid invoice for plan with no credit allotment: invoice_id={}, plan={}",
                invoice.id,
                subscription.plan
            );
            return Ok(SubscriptionOutcome::Ignored(format!(
                "no credit allotment for plan {}",
                subscription.plan
            )));
        };

        let reason = format!("subscription:{}:{}", subscription.plan, invoice.id);
        let outcome = self
            .ledger
            .grant(subscription.user_id, credits, &invoice.id, &reason)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Storage failure granting invoice credits, provider will retry: invoice_id={}, error={}",
                    invoice.id,
                    e
                );
                ReconcileError::Storage(e.to_string())
            })?;

        if outcome.applied {
            tracing::info!(
                "Invoice credits granted: invoice_id={}, user_id={}, credits={}, balance={}",
                invoice.id,
                subscription.user_id,
                credits,
                outcome.balance
            );
            Ok(SubscriptionOutcome::GrantApplied {
                balance: outcome.balance,
            })
        } else {
            Ok(SubscriptionOutcome::DuplicateInvoice)
        }
    }

    async fn mark_past_due(
        &self,
        object: serde_json::Value,
    ) -> Result<SubscriptionOutcome, ReconcileError> {
        let invoice: InvoiceObject = serde_json::from_value(object)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        let updated = self
            .subscriptions
            .set_status(&invoice.subscription, SubscriptionStatus::PastDue)
            .await
            .map_err(|e| ReconcileError::Storage(e.to_string()))?;

        if updated {
            tracing::info!(
                "Subscription marked past due: invoice_id={}, subscription_id={}",
                invoice.id,
                invoice.subscription
            );
            Ok(SubscriptionOutcome::MarkedPastDue)
        } else {
            tracing::warn!(
                "Failed invoice for unknown subscription: invoice_id={}, subscription_id={}",
                invoice.id,
                invoice.subscription
            );
            Ok(SubscriptionOutcome::UnknownSubscription)
        }
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }
}

fn unix_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}
