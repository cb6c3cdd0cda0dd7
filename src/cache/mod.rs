//! Process-wide caches shared by every request.
//!
//! The site configuration cache maps a hostname to the serialized configuration
//! document last loaded for it. Entries are populated lazily and invalidated
//! explicitly (admin saves, manual eviction) or by an optional TTL.

mod lock;
mod site;

pub use site::SiteConfigCache;
