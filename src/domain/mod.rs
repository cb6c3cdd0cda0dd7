//! Domain layer types and invariants.

pub mod content;
pub mod document;
pub mod error;
pub mod extract;
pub mod form;
pub mod site_config;
pub mod user;
