#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::http::Method;
use serde_json::Value;
use tokio::sync::Mutex;

use sitehook::{
    application::{
        content::ContentService,
        context::{RequestData, SiteContext},
        repos::{ContentQuery, ContentsRepo, OptionsRepo, RepoError, UserRecord, UsersRepo},
        services::AppServices,
        site::SiteService,
    },
    cache::SiteConfigCache,
    domain::{
        content,
        document::{Document, DocumentId, ID_FIELD},
        form::FormInput,
        site_config::SiteConfig,
        user::User,
    },
};

/// In-memory stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryStore {
    options: Mutex<Vec<(String, Value)>>,
    contents: Mutex<Vec<(DocumentId, Document)>>,
    users: Mutex<HashMap<String, UserRecord>>,
    options_reads: AtomicUsize,
    options_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a raw options document, bypassing the object check of `insert_options`.
    pub async fn seed_options(&self, host: &str, document: Value) {
        self.options.lock().await.push((host.to_string(), document));
    }

    pub async fn add_user(&self, token: &str, level: i32) -> User {
        let id = DocumentId::generate();
        let hash = sitehook::application::modules::user::hash_token(token);
        self.users
            .lock()
            .await
            .insert(hash, UserRecord { id, level });
        User::new(id, level)
    }

    pub async fn options_for(&self, host: &str) -> Vec<Value> {
        self.options
            .lock()
            .await
            .iter()
            .filter(|(stored, _)| stored == host)
            .map(|(_, document)| document.clone())
            .collect()
    }

    pub async fn content_count(&self) -> usize {
        self.contents.lock().await.len()
    }

    pub fn options_reads(&self) -> usize {
        self.options_reads.load(Ordering::SeqCst)
    }

    pub fn options_writes(&self) -> usize {
        self.options_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OptionsRepo for MemoryStore {
    async fn latest_options(&self, host: &str) -> Result<Option<Value>, RepoError> {
        self.options_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .options
            .lock()
            .await
            .iter()
            .rev()
            .find(|(stored, _)| stored == host)
            .map(|(_, document)| document.clone()))
    }

    async fn insert_options(
        &self,
        host: &str,
        document: &Document,
    ) -> Result<DocumentId, RepoError> {
        self.options_writes.fetch_add(1, Ordering::SeqCst);
        self.options
            .lock()
            .await
            .push((host.to_string(), Value::Object(document.clone())));
        Ok(DocumentId::generate())
    }
}

#[async_trait]
impl ContentsRepo for MemoryStore {
    async fn insert_content(&self, mut document: Document) -> Result<DocumentId, RepoError> {
        document.remove(ID_FIELD);
        let id = DocumentId::generate();
        self.contents.lock().await.push((id, document));
        Ok(id)
    }

    async fn update_content(&self, id: DocumentId, fields: Document) -> Result<(), RepoError> {
        let mut contents = self.contents.lock().await;
        let (_, document) = contents
            .iter_mut()
            .find(|(stored, _)| *stored == id)
            .ok_or(RepoError::NotFound)?;
        for (key, value) in fields {
            if key != ID_FIELD {
                document.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete_content(&self, id: DocumentId) -> Result<(), RepoError> {
        let mut contents = self.contents.lock().await;
        let before = contents.len();
        contents.retain(|(stored, _)| *stored != id);
        if contents.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_content(&self, query: &ContentQuery) -> Result<Option<Document>, RepoError> {
        Ok(self
            .contents
            .lock()
            .await
            .iter()
            .find(|(id, document)| query.matches(*id, document))
            .map(|(id, document)| {
                let mut document = document.clone();
                document.insert(ID_FIELD.into(), Value::from(*id));
                document
            }))
    }

    async fn push_comment(
        &self,
        content_id: DocumentId,
        comment: Document,
    ) -> Result<(), RepoError> {
        let mut contents = self.contents.lock().await;
        let (_, document) = contents
            .iter_mut()
            .find(|(stored, _)| *stored == content_id)
            .ok_or(RepoError::NotFound)?;
        content::push_comment(document, comment);
        Ok(())
    }

    async fn replace_comment(
        &self,
        content_id: DocumentId,
        comment_id: DocumentId,
        comment: Document,
    ) -> Result<bool, RepoError> {
        let mut contents = self.contents.lock().await;
        let (_, document) = contents
            .iter_mut()
            .find(|(stored, _)| *stored == content_id)
            .ok_or(RepoError::NotFound)?;
        Ok(content::replace_comment(document, comment_id, comment))
    }

    async fn pull_comment(
        &self,
        content_id: DocumentId,
        comment_id: DocumentId,
    ) -> Result<bool, RepoError> {
        let mut contents = self.contents.lock().await;
        let (_, document) = contents
            .iter_mut()
            .find(|(stored, _)| *stored == content_id)
            .ok_or(RepoError::NotFound)?;
        Ok(content::remove_comment(document, comment_id))
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.lock().await.get(token_hash).cloned())
    }
}

pub fn services(store: &Arc<MemoryStore>) -> Arc<AppServices> {
    services_with(store, false)
}

pub fn services_with(store: &Arc<MemoryStore>, debug: bool) -> Arc<AppServices> {
    let options: Arc<dyn OptionsRepo> = store.clone();
    let contents: Arc<dyn ContentsRepo> = store.clone();
    let users: Arc<dyn UsersRepo> = store.clone();
    Arc::new(AppServices {
        sites: Arc::new(SiteService::new(
            options,
            Arc::new(SiteConfigCache::default()),
        )),
        content: Arc::new(ContentService::new(contents)),
        users,
        debug,
    })
}

pub fn config(value: Value) -> SiteConfig {
    SiteConfig::from_value(value).expect("configuration must be an object")
}

pub fn context(
    services: Arc<AppServices>,
    path: &str,
    form: FormInput,
    config: SiteConfig,
) -> SiteContext {
    let request = RequestData::new("example.test", Method::GET, path).with_form(form);
    SiteContext::new(services, request, config)
}
