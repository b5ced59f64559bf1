//! Request-processing core: validation gate, model cache, scoring engine.

pub mod cache;
pub mod scoring;
pub mod store;
pub mod validation;
