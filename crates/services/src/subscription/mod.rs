pub mod ports;

pub use ports::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};
