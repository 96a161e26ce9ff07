pub mod cost;
pub mod gateway;
pub mod ports;
pub mod service;

pub use cost::CostTable;
pub use gateway::{Authorization, DebitGateway};
pub use ports::{
    DebitOutcome, EntryKind, GrantOutcome, HistoryPage, LedgerEntry, LedgerError, LedgerStore,
};
pub use service::CreditLedger;
