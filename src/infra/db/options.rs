use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::{
    application::repos::{OptionsRepo, RepoError},
    domain::document::{Document, DocumentId},
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl OptionsRepo for PostgresRepositories {
    async fn latest_options(&self, host: &str) -> Result<Option<Value>, RepoError> {
        let row: Option<(Value,)> = sqlx::query_as(
            r#"
            SELECT document
            FROM options
            WHERE host = $1
            ORDER BY created DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(host)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|(document,)| document))
    }

    async fn insert_options(
        &self,
        host: &str,
        document: &Document,
    ) -> Result<DocumentId, RepoError> {
        let id = DocumentId::generate();
        sqlx::query(
            r#"
            INSERT INTO options (id, host, created, document)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(host)
        .bind(OffsetDateTime::now_utc())
        .bind(Json(document))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }
}
