//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (node, backend, hostgroup)
//!     → spans: one per reconciliation pass, parented on the caller's span
//!
//! Consumers:
//!     → logging.rs subscriber (stderr, pretty or JSON)
//! ```
//!
//! # Design Decisions
//! - Library code never installs a subscriber; only the binary does
//! - Credentials have redacting `Debug` impls and are never logged

pub mod logging;
