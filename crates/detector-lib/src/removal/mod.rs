//! Removed-flow bookkeeping
//!
//! Switches evict flow entries asynchronously; their final packet counts
//! arrive on a broadcast feed, not in the next stats snapshot. The ledger
//! parks those counts until the engine reconciles them at the next epoch
//! boundary, and the listener task keeps the ledger fed.

mod ledger;
mod listener;

pub use ledger::RemovalLedger;
pub use listener::run_removal_listener;
