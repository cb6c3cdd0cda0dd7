use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{ContentClause, ContentQuery, ContentsRepo, RepoError},
    domain::{
        content,
        document::{Document, DocumentId, ID_FIELD},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    document: Json<Document>,
}

impl ContentRow {
    /// The stored document with its identifier exposed under `_id`.
    fn into_document(self) -> Document {
        let mut document = self.document.0;
        document.insert(
            ID_FIELD.into(),
            Value::from(DocumentId::from_uuid(self.id)),
        );
        document
    }
}

impl PostgresRepositories {
    fn push_clause(qb: &mut QueryBuilder<'_, Postgres>, clause: &ContentClause) {
        match clause {
            ContentClause::Id(id) => {
                qb.push("id = ");
                qb.push_bind(id.as_uuid());
            }
            ContentClause::Field { key, value } => {
                qb.push("document ->> ");
                qb.push_bind(key.clone());
                qb.push(" = ");
                qb.push_bind(value.clone());
            }
        }
    }

    /// Read-modify-write of one content document under a row lock.
    ///
    /// `apply` returning `false` leaves the row untouched.
    async fn modify_content<F>(&self, id: DocumentId, apply: F) -> Result<bool, RepoError>
    where
        F: FnOnce(&mut Document) -> bool + Send,
    {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row: Option<(Json<Document>,)> =
            sqlx::query_as("SELECT document FROM contents WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        let Some((Json(mut document),)) = row else {
            return Err(RepoError::NotFound);
        };

        if !apply(&mut document) {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(false);
        }

        sqlx::query("UPDATE contents SET document = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(Json(&document))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }
}

#[async_trait]
impl ContentsRepo for PostgresRepositories {
    async fn insert_content(&self, mut document: Document) -> Result<DocumentId, RepoError> {
        document.remove(ID_FIELD);
        let id = DocumentId::generate();
        sqlx::query(
            r#"
            INSERT INTO contents (id, created, document)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id.as_uuid())
        .bind(OffsetDateTime::now_utc())
        .bind(Json(&document))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn update_content(&self, id: DocumentId, mut fields: Document) -> Result<(), RepoError> {
        fields.remove(ID_FIELD);
        let result = sqlx::query("UPDATE contents SET document = document || $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(Json(&fields))
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_content(&self, id: DocumentId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM contents WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_content(&self, query: &ContentQuery) -> Result<Option<Document>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id, document FROM contents WHERE ");
        for (index, clause) in query.clauses().iter().enumerate() {
            if index > 0 {
                qb.push(" OR ");
            }
            Self::push_clause(&mut qb, clause);
        }
        qb.push(" ORDER BY created ASC LIMIT 1");

        let row = qb
            .build_query_as::<ContentRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ContentRow::into_document))
    }

    async fn push_comment(
        &self,
        content_id: DocumentId,
        comment: Document,
    ) -> Result<(), RepoError> {
        self.modify_content(content_id, move |document| {
            content::push_comment(document, comment);
            true
        })
        .await
        .map(|_| ())
    }

    async fn replace_comment(
        &self,
        content_id: DocumentId,
        comment_id: DocumentId,
        comment: Document,
    ) -> Result<bool, RepoError> {
        self.modify_content(content_id, move |document| {
            content::replace_comment(document, comment_id, comment)
        })
        .await
    }

    async fn pull_comment(
        &self,
        content_id: DocumentId,
        comment_id: DocumentId,
    ) -> Result<bool, RepoError> {
        self.modify_content(content_id, move |document| {
            content::remove_comment(document, comment_id)
        })
        .await
    }
}
