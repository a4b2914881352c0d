//! Deploy Sanitizer - pre-deployment artifact remover
//!
//! Strips a project tree of everything that should not ship to a size-constrained
//! host: Python bytecode, model and vector-store caches, model weight files,
//! virtual environments and local databases. What gets removed is driven by an
//! explicit policy table (see `policy.toml`), applied one category at a time.
//!
//! Deletion is best effort. An entry that cannot be removed is recorded in the
//! [`SanitizeReport`] and the run carries on; running twice is the same as
//! running once.

pub mod patterns;
pub mod report;
pub mod sanitizer;
pub mod scanner;

// Re-export commonly used items
pub use patterns::{Category, MatchKind, Policy, PolicyError, RemovalRule};
pub use report::{ConsoleReporter, NullSink, ProgressSink};
pub use sanitizer::{
    remove_entry, sanitize, Outcome, RemovalRecord, SanitizeOptions, SanitizeReport, Sanitizer,
    Summary,
};
pub use scanner::{entry_size, scan, EntryKind, Match, ScanOptions, VCS_INTERNALS};
