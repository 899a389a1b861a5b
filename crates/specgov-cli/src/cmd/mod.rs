pub mod ingest;
pub mod taskgen;
pub mod validate;
