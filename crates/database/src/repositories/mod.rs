pub mod ledger_repository;
pub mod payment_intent_repository;
pub mod subscription_repository;

pub use ledger_repository::PostgresLedgerRepository;
pub use payment_intent_repository::PostgresPaymentIntentRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
