//! Acting user resolved for a request.

use serde::Serialize;

use super::document::DocumentId;

/// Level required to comment when a content type does not override it.
pub const DEFAULT_COMMENT_LEVEL: i32 = 100;
/// Users at or above this level may edit comments they do not own.
pub const MODERATOR_LEVEL: i32 = 200;
/// Level required for the admin routes and content management.
pub const ADMIN_LEVEL: i32 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Option<DocumentId>,
    pub level: i32,
}

impl User {
    pub fn new(id: DocumentId, level: i32) -> Self {
        Self {
            id: Some(id),
            level,
        }
    }

    pub fn anonymous() -> Self {
        Self { id: None, level: 0 }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_moderator(&self) -> bool {
        self.level >= MODERATOR_LEVEL
    }

    pub fn is_admin(&self) -> bool {
        self.level >= ADMIN_LEVEL
    }

    pub fn is_author(&self, author: DocumentId) -> bool {
        self.id == Some(author)
    }
}

impl Default for User {
    fn default() -> Self {
        Self::anonymous()
    }
}
