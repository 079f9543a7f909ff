//! Loader for PREVIC actuarial-disclosure extracts (Demonstrações
//! Atuariais): reads the yearly CSV drops, canonicalizes their headers,
//! dedups against what the SQLite store already holds for each reporting
//! year, and appends the rest. The dashboard side only ever reads.

pub mod columns;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod query;
pub mod source;
pub mod store;
