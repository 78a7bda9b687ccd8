pub mod assembler;
pub mod classifier;
pub mod handlers;
pub mod library_sections;
pub mod ordering;
pub mod parse;
pub mod prompts;
pub mod store;
pub mod title_contact;

/// Substituted for proposal content that is missing or too short.
pub const NOT_AVAILABLE: &str = "Not available in the RFP document";
