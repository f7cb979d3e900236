//! `transit-core`: pure types and logic for importing projects into a
//! destination namespace.
//!
//! No database access lives here. Collaborators that need I/O are
//! expressed as traits (see [`naming::DestinationLookup`]) and implemented
//! by `transit-db`.

pub mod bulk_import;
pub mod error;
pub mod naming;
pub mod types;
pub mod visibility;
