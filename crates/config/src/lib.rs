use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("DATABASE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: std::env::var("DATABASE_NAME").unwrap_or_else(|_| "credits_api".to_string()),
            username: std::env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: if let Ok(path) = std::env::var("DATABASE_PASSWORD_FILE") {
                std::fs::read_to_string(&path)
                    .map(|p| p.trim().to_string())
                    .unwrap_or_else(|e| {
                        panic!("Failed to read DATABASE_PASSWORD_FILE at {}: {}", path, e)
                    })
            } else {
                std::env::var("DATABASE_PASSWORD").unwrap_or_else(|_| "postgres".to_string())
            },
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}

/// Read a secret from <VAR>_FILE when set, falling back to <VAR> itself.
fn secret_from_env(var: &str) -> String {
    let file_var = format!("{}_FILE", var);
    if let Ok(path) = std::env::var(&file_var) {
        std::fs::read_to_string(&path)
            .map(|p| p.trim().to_string())
            .unwrap_or_else(|e| panic!("Failed to read {} at {}: {}", file_var, path, e))
    } else {
        std::env::var(var).unwrap_or_default()
    }
}

/// Payment provider configuration: shared secrets for webhook verification.
#[derive(Clone, Deserialize)]
pub struct PaymentConfig {
    /// Merchant identifier assigned by the one-time payment provider.
    pub merchant_id: String,
    /// Shared secret for one-time payment notifications (field signature).
    pub onetime_webhook_secret: String,
    /// Shared secret for subscription webhooks (signature over the raw body).
    pub subscription_webhook_secret: String,
    /// Maximum accepted age of a signed subscription webhook, in seconds.
    pub signature_tolerance_secs: i64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            merchant_id: std::env::var("PAYMENT_MERCHANT_ID").unwrap_or_default(),
            onetime_webhook_secret: secret_from_env("ONETIME_WEBHOOK_SECRET"),
            subscription_webhook_secret: secret_from_env("SUBSCRIPTION_WEBHOOK_SECRET"),
            signature_tolerance_secs: std::env::var("WEBHOOK_SIGNATURE_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        }
    }
}

impl PaymentConfig {
    /// Returns true if both provider secrets are present.
    pub fn is_configured(&self) -> bool {
        !self.onetime_webhook_secret.is_empty() && !self.subscription_webhook_secret.is_empty()
    }
}

// Custom Debug to redact shared secrets from log output (never log credentials)
impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("merchant_id", &self.merchant_id)
            .field("onetime_webhook_secret", &"[REDACTED]")
            .field("subscription_webhook_secret", &"[REDACTED]")
            .field("signature_tolerance_secs", &self.signature_tolerance_secs)
            .finish()
    }
}

/// A purchasable credit pack: what a Payment Intent is created from.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditPack {
    pub id: String,
    /// Credits granted when the pack is paid for.
    pub credits: i64,
    /// Expected price in the smallest currency unit (e.g. cents).
    pub amount_minor: i64,
}

/// Billing parameters: cost table for metered actions plus the plan catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// How many estimated tokens one credit covers.
    pub tokens_per_credit: u64,
    /// Minimum charge per metered action, in credits.
    pub min_charge_credits: i64,
    /// Per-model cost multiplier. Models not listed here are rejected.
    pub model_multipliers: HashMap<String, i64>,
    /// One-time purchasable credit packs.
    pub credit_packs: Vec<CreditPack>,
    /// Credits granted per paid subscription period, keyed by plan name.
    pub subscription_plan_credits: HashMap<String, i64>,
    /// Currency expected on one-time payment notifications.
    pub currency: String,
}

/// Split a comma-separated env var value into non-empty trimmed entries.
fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_model_multipliers(raw: &str) -> HashMap<String, i64> {
    let mut map = HashMap::new();
    for entry in split_csv(raw) {
        let (model, mult) = entry.split_once(':').unwrap_or_else(|| {
            panic!(
                "MODEL_COST_MULTIPLIERS entry '{}' must be '<model>:<multiplier>'",
                entry
            )
        });
        let mult: i64 = mult.trim().parse().unwrap_or_else(|_| {
            panic!(
                "MODEL_COST_MULTIPLIERS entry '{}' has a non-integer multiplier",
                entry
            )
        });
        map.insert(model.trim().to_string(), mult);
    }
    map
}

fn parse_credit_packs(raw: &str) -> Vec<CreditPack> {
    split_csv(raw)
        .into_iter()
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            if parts.len() != 3 {
                panic!(
                    "CREDIT_PACKS entry '{}' must be '<id>:<credits>:<amount_minor>'",
                    entry
                );
            }
            let credits: i64 = parts[1].trim().parse().unwrap_or_else(|_| {
                panic!("CREDIT_PACKS entry '{}' has non-integer credits", entry)
            });
            let amount_minor: i64 = parts[2].trim().parse().unwrap_or_else(|_| {
                panic!("CREDIT_PACKS entry '{}' has non-integer amount", entry)
            });
            CreditPack {
                id: parts[0].trim().to_string(),
                credits,
                amount_minor,
            }
        })
        .collect()
}

fn parse_plan_credits(raw: &str) -> HashMap<String, i64> {
    let mut map = HashMap::new();
    for entry in split_csv(raw) {
        let (plan, credits) = entry.split_once(':').unwrap_or_else(|| {
            panic!(
                "SUBSCRIPTION_PLAN_CREDITS entry '{}' must be '<plan>:<credits>'",
                entry
            )
        });
        let credits: i64 = credits.trim().parse().unwrap_or_else(|_| {
            panic!(
                "SUBSCRIPTION_PLAN_CREDITS entry '{}' has non-integer credits",
                entry
            )
        });
        map.insert(plan.trim().to_string(), credits);
    }
    map
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            tokens_per_credit: std::env::var("TOKENS_PER_CREDIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            min_charge_credits: std::env::var("MIN_CHARGE_CREDITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            model_multipliers: parse_model_multipliers(
                &std::env::var("MODEL_COST_MULTIPLIERS").unwrap_or_default(),
            ),
            credit_packs: parse_credit_packs(&std::env::var("CREDIT_PACKS").unwrap_or_default()),
            subscription_plan_credits: parse_plan_credits(
                &std::env::var("SUBSCRIPTION_PLAN_CREDITS").unwrap_or_default(),
            ),
            currency: std::env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Log output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub payment: PaymentConfig,
    pub billing: BillingConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            payment: PaymentConfig::default(),
            billing: BillingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
