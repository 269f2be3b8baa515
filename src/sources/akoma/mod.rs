pub mod header;
pub mod parser;

pub use parser::AkomaParser;
