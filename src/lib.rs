pub mod canonical;
pub mod config;
pub mod conflicts;
pub mod dates;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod references;
pub mod sources;
pub mod taxonomy;
pub mod text;
pub mod types;
pub mod xml_tree;
