pub mod ledger;
pub mod payment;
pub mod signature;
pub mod subscription;
pub mod test_helpers;
pub mod types;

pub use types::UserId;
