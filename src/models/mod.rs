//! Data models

pub mod artifact;
pub mod decision;
pub mod request;

pub use artifact::*;
pub use decision::*;
pub use request::*;
