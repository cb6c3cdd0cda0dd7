//! Application services layer: request dispatch, hooks and the content model.

pub mod content;
pub mod context;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod modules;
pub mod repos;
pub mod services;
pub mod site;
