pub mod canva;
pub mod library;
pub mod proposal;
pub mod rfp;
pub mod template;
