//! Types library for the sports odds feed services
//!
//! Vocabulary shared between a feed cache and its collaborators: the
//! poller that produces snapshots and the publisher that consumes derived
//! match records.
//!
//! # Modules
//! - `ids`: Feed identifiers and source namespacing
//! - `frame`: Live / non-live frame type
//! - `errors`: Lookup and derivation failures

pub mod ids;
pub mod frame;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::frame::*;
    pub use crate::errors::*;
}
