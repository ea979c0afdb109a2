//! Persistence gateway for the field-visit ledger.
//!
//! [`FieldSession`] owns the catalog, the in-memory ledger and the UI's edit
//! selection. It hydrates from the remote ledger endpoint (falling back to
//! the [`LocalCache`]), writes the whole ledger back after every mutation,
//! and can be refreshed periodically with [`poll_until`].

pub mod cache;
pub mod client;
pub mod error;
pub mod poll;
pub mod session;

pub use cache::LocalCache;
pub use client::LedgerClient;
pub use error::GatewayError;
pub use poll::poll_until;
pub use session::{FieldSession, HydrateSource, SaveOutcome, VisitInput};
