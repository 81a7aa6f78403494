//! Metadata store adapter for Depot
//!
//! Typed access to the artifacts table, with implementations for SQLite and
//! PostgreSQL. JSON-field predicates are rendered through a single dialect-
//! aware predicate algebra so the two backends stay in lockstep.

pub mod postgres;
pub mod predicate;
pub mod query;
pub mod sqlite;
pub mod traits;

pub use postgres::PostgresArtifactStore;
pub use predicate::{Dialect, FilterMode, ListPlan, OrderField, Predicate, Scope};
pub use query::plan_children;
pub use sqlite::SqliteArtifactStore;
pub use traits::{ArtifactRepository, ReadOnlyRepository, StatField};
