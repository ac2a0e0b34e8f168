pub mod compare;
pub mod correlate;
pub mod data;
pub mod error;
pub mod ingest;
pub mod report;

pub use error::ShadowdiffError;
