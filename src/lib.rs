//! Tollgate - repository access resolution
//!
//! Maintains a materialized ledger of per-user repository access derived from
//! ownership, collaborations and organization teams, and answers access checks
//! against it. It exposes all modules for testing purposes.

pub mod access;
pub mod entities;
pub mod errors;
pub mod settings;
pub mod storage;
