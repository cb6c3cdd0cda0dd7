//! Shared, read-mostly services handed to every request context.

use std::sync::Arc;

use crate::application::{content::ContentService, repos::UsersRepo, site::SiteService};

#[derive(Clone)]
pub struct AppServices {
    pub sites: Arc<SiteService>,
    pub content: Arc<ContentService>,
    pub users: Arc<dyn UsersRepo>,
    pub debug: bool,
}
