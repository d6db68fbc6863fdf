//! Curio core - activity history queries and order reconciliation.
//!
//! This crate holds the venue-independent heart of the indexer: the
//! data model, the continuation-based filter compiler, the store
//! capabilities with their in-memory and Postgres bindings, the paged
//! activity query service, and the order reconciler.
//!
//! # Core Types
//!
//! - [`Address`], [`OrderHash`], [`TokenId`] — Fixed-size identifier newtypes
//! - [`ActivityRecord`], [`ActivityKind`], [`LogStatus`] — Append-only history
//! - [`OrderVersion`], [`CanonicalOrder`], [`OrderStatus`] — Order aggregates
//!
//! # Components
//!
//! - [`continuation`] — Opaque page tokens and scroll predicates
//! - [`filter`] — The (scope, type) → (predicate, hint) compiler
//! - [`store`] — History and order store traits plus bindings
//! - [`query`] — The paged activity query service
//! - [`reconcile`] — Serialized, versioned order event application

pub mod continuation;
pub mod error;
pub mod filter;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod store;

pub use continuation::{Continuation, SortDirection};
pub use error::{CoreError, StoreError};
pub use filter::{ActivityFilter, ActivityScope, ActivityType};
pub use model::{
    ActivityKind, ActivityRecord, Address, Asset, AssetType, CanonicalOrder, LogStatus, OrderHash,
    OrderStatus, OrderVersion, Platform, TokenId,
};
pub use query::{ActivityPage, ActivityQueryService};
pub use reconcile::{OrderEvent, Reconciler};
pub use store::{HistoryStore, OrderStore, SaveResult};
