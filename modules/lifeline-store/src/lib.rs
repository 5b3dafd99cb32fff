//! Postgres implementations of the engine's store seams.
//!
//! `PgAlertStore` and `PgFacilityDirectory` implement the `AlertStore` and
//! `FacilityDirectory` traits from `lifeline-engine`. Every alert mutation
//! is a single conditional SQL statement; the guard and the write commit
//! together or not at all.

pub mod alerts;
pub mod facilities;
pub mod schema;

pub use alerts::PgAlertStore;
pub use facilities::PgFacilityDirectory;
pub use schema::migrate;
