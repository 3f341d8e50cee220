//! One-shot bulk migration of a Classport document-store export into a
//! relational SQLite destination.
//!
//! Data flow: [`source::DocumentSource`] → [`transform`] (which leans on
//! [`time`] and [`fields`]) → [`sink::WriteSink`] → [`runlog::RunLogger`],
//! driven in dependency order by [`pipeline::Pipeline`].

pub mod error;
pub mod fields;
pub mod pipeline;
pub mod runlog;
pub mod schema;
pub mod sink;
pub mod source;
pub mod time;
pub mod transform;

pub use error::{MigrateError, SourceError};
pub use pipeline::{EntityCounts, Pipeline, RunSummary};
pub use runlog::RunLogger;
pub use sink::{WriteOutcome, WriteSink};
pub use source::{Document, DocumentSource, ExportDirSource};
