//! Query understanding

pub mod parser;

pub use parser::{Intent, ParsedQuery, QueryParser};
