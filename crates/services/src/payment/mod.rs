pub mod checkout;
pub mod ports;
pub mod reconcile;

pub use checkout::{CheckoutError, CheckoutService};
pub use ports::{
    CompletionOutcome, FailOutcome, IntentStatus, NewPaymentIntent, PaymentIntent,
    PaymentIntentStore,
};
pub use reconcile::{
    OneTimeNotification, OneTimeOutcome, ReconcileError, ReconciliationEngine,
    SubscriptionOutcome,
};
