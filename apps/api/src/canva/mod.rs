pub mod client;
pub mod dataset;
pub mod design;
pub mod design_cache;
pub mod handlers;
pub mod oauth;
pub mod polling;
pub mod store;
