use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, UserRecord, UsersRepo},
    domain::document::DocumentId,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    level: i32,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: DocumentId::from_uuid(row.id),
            level: row.level,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, level
            FROM users
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }
}
