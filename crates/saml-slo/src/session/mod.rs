//! Session participant registry and logout transaction state

pub mod participants;
pub mod store;
pub mod types;

pub use participants::{SessionParticipant, SessionParticipants};
pub use store::{InMemoryTransactionStore, TransactionStore};
pub use types::{DispatchState, GlobalTransaction, RequestEcho, StoredState};
