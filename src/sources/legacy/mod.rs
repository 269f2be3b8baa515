pub mod parser;

pub use parser::LegacyParser;
