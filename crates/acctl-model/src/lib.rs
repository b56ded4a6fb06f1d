//! Data model for per-account execution admission.
//!
//! Everything here is plain data: identifiers, the per-account state record,
//! queue entries and the read-only views handed to dashboards.

mod domain;
pub use domain::*;
