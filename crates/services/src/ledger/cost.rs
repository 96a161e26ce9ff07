use std::collections::HashMap;

/// Cost table for metered actions: converts a token estimate into a credit
/// charge before the action is dispatched. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct CostTable {
    tokens_per_credit: u64,
    min_charge_credits: i64,
    multipliers: HashMap<String, i64>,
}

impl CostTable {
    pub fn new(
        tokens_per_credit: u64,
        min_charge_credits: i64,
        multipliers: HashMap<String, i64>,
    ) -> Self {
        Self {
            // 0 would divide by zero; treat as 1 token per credit.
            tokens_per_credit: tokens_per_credit.max(1),
            min_charge_credits: min_charge_credits.max(0),
            multipliers,
        }
    }

    pub fn from_config(cfg: &config::BillingConfig) -> Self {
        Self::new(
            cfg.tokens_per_credit,
            cfg.min_charge_credits,
            cfg.model_multipliers.clone(),
        )
    }

    /// Charge in credits for running `model_id` over an estimated
    /// `estimated_tokens`: ceil(tokens / tokens_per_credit) * multiplier,
    /// floored at the minimum charge. None for models not in the table.
    pub fn cost_for(&self, model_id: &str, estimated_tokens: u64) -> Option<i64> {
        let multiplier = *self.multipliers.get(model_id)?;
        let units = estimated_tokens.div_ceil(self.tokens_per_credit) as i64;
        Some((units * multiplier).max(self.min_charge_credits))
    }

    pub fn knows_model(&self, model_id: &str) -> bool {
        self.multipliers.contains_key(model_id)
    }
}
