//! Persistence layer for Marina
//!
//! The document store is a narrow collaborator interface with a Postgres
//! (JSONB) implementation for production and an in-memory implementation for
//! tests. Report persistence is a concrete Postgres repository.

pub mod memory;
pub mod postgres;
pub mod report;
pub mod store;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use report::ReportRepository;
pub use store::{Document, DocumentStore, FieldUpdate};
