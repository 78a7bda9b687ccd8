//! Content Library — company profile, team members and project references.

pub mod handlers;
pub mod store;
