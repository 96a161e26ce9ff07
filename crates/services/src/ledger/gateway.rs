use std::sync::Arc;

use super::cost::CostTable;
use super::ports::{DebitOutcome, LedgerError};
use super::service::CreditLedger;
use crate::UserId;

/// Outcome of an authorization attempt for a metered action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// The debit was applied; the caller may dispatch the action.
    Granted { cost: i64, remaining: i64 },
    /// Balance could not cover the computed cost. Nothing changed, so
    /// retrying without a top-up is pointless.
    InsufficientBalance { balance: i64, required: i64 },
    /// Model is absent from the cost table; the action is never priced
    /// with a default.
    UnknownModel { model_id: String },
}

/// Synchronous entry point called inline on the request path before any
/// metered action runs. Computes the cost and makes the debit the gating
/// decision. No external I/O: bounded latency by construction.
pub struct DebitGateway {
    ledger: Arc<CreditLedger>,
    costs: CostTable,
}

impl DebitGateway {
    pub fn new(ledger: Arc<CreditLedger>, costs: CostTable) -> Self {
        Self { ledger, costs }
    }

    pub async fn authorize(
        &self,
        user_id: UserId,
        model_id: &str,
        estimated_tokens: u64,
    ) -> Result<Authorization, LedgerError> {
        let Some(cost) = self.costs.cost_for(model_id, estimated_tokens) else {
            tracing::info!(
                "Authorization rejected (unknown model): user_id={}, model_id={}",
                user_id,
                model_id
            );
            return Ok(Authorization::UnknownModel {
                model_id: model_id.to_string(),
            });
        };

        let reason = format!("{}:{}tok", model_id, estimated_tokens);
        match self.ledger.debit(user_id, cost, &reason).await? {
            DebitOutcome::Accepted { remaining } => {
                Ok(Authorization::Granted { cost, remaining })
            }
            DebitOutcome::InsufficientBalance { balance } => {
                Ok(Authorization::InsufficientBalance {
                    balance,
                    required: cost,
                })
            }
        }
    }
}
