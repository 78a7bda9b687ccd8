pub mod analyzer;
pub mod deadlines;
pub mod handlers;
pub mod prompts;
pub mod store;

/// Analyzer placeholder for a scalar field nothing could be found for.
pub const NOT_MENTIONED: &str = "Not mentioned in the document";
