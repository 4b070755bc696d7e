//! Repository access resolution.
//!
//! Effective access is the combination of ownership, direct collaboration and
//! team membership in an owning organization. The non-implicit part of it is
//! materialized in the `accesses` table (the ledger), which is rebuilt per
//! repository whenever one of its inputs changes and read on every check.

pub mod collector;
pub mod engine;
pub mod ledger;
pub mod locks;
pub mod mode;
pub mod resolver;
pub mod triggers;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::AccessEngine;
pub use ledger::LedgerEntry;
pub use locks::RepoLocks;
pub use mode::AccessMode;
