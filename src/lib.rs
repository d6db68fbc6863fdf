//! Curio: NFT marketplace activity and order indexer.
//!
//! Umbrella crate re-exporting the workspace members:
//!
//! - [`core`]: data model, continuation math, activity filter compiler,
//!   store capabilities, the activity query service, and the order
//!   reconciler.
//! - [`indexer`]: venue API clients and adapters, the cursor-based venue
//!   syncer, the active-order prober, and the sync scheduler.

pub use curio_core as core;
pub use curio_indexer as indexer;
