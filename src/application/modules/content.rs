//! The `content` module: exposes the content model over `/content/...` and `/b/content/...`.
//!
//! Per-type options live under `content.types.<type>`:
//! `rules`, `comment_rules`, `_level` and `_comment_level`.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::{
    application::{
        content::{
            CONTENT_ID_PARAM, ContentError, ID_PARAM, extract_ids, level_option,
        },
        context::SiteContext,
        dispatch::BACK_SEGMENT,
        hooks::{BackHook, FrontHook, HookError, TestHook},
    },
    domain::{
        content::{BODY_FIELD, SLUG_FIELD, TITLE_FIELD, TYPE_FIELD},
        document::{Document, DocumentId, ID_FIELD},
        extract::{ExtractError, ExtractionRule},
        site_config::{BACK_HOOKS_PATH, FRONT_HOOKS_PATH, SiteConfig},
        user::{ADMIN_LEVEL, User},
    },
};

pub const MODULE_NAME: &str = "content";
pub const TYPES_PATH: &str = "content.types";
pub const RULES_KEY: &str = "rules";
pub const COMMENT_RULES_KEY: &str = "comment_rules";
pub const LEVEL_OPTION: &str = "_level";

/// Addressing keys tried by the front route, in order.
const FRONT_KEYS: [&str; 2] = [SLUG_FIELD, ID_FIELD];

/// Resolved options for one content type.
#[derive(Debug, Clone)]
pub struct TypeOptions {
    pub rules: ExtractionRule,
    pub comment_rules: ExtractionRule,
    pub level: i32,
    pub options: Document,
}

impl TypeOptions {
    pub fn default_rules() -> ExtractionRule {
        ExtractionRule::new()
            .required(TITLE_FIELD)
            .optional(SLUG_FIELD)
            .optional(BODY_FIELD)
    }

    pub fn default_comment_rules() -> ExtractionRule {
        ExtractionRule::new().required(BODY_FIELD)
    }

    /// Options for `kind`; unconfigured types get the defaults.
    pub fn resolve(config: &SiteConfig, kind: Option<&str>) -> Result<Self, ExtractError> {
        let options = kind
            .and_then(|kind| config.section(TYPES_PATH)?.get(kind))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self::from_options(options)
    }

    fn from_options(options: Document) -> Result<Self, ExtractError> {
        let rules = match options.get(RULES_KEY) {
            Some(value) => ExtractionRule::from_value(value)?,
            None => Self::default_rules(),
        };
        let comment_rules = match options.get(COMMENT_RULES_KEY) {
            Some(value) => ExtractionRule::from_value(value)?,
            None => Self::default_comment_rules(),
        };
        let level = level_option(&options, LEVEL_OPTION, ADMIN_LEVEL);
        Ok(Self {
            rules,
            comment_rules,
            level,
            options,
        })
    }

    fn authorize(&self, user: &User) -> Result<(), ContentError> {
        if user.level < self.level {
            return Err(ContentError::InsufficientLevel {
                required: self.level,
                actual: user.level,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Insert,
    Update,
    Delete,
    InsertComment,
    UpdateComment,
    DeleteComment,
}

impl Operation {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "insert_comment" => Some(Self::InsertComment),
            "update_comment" => Some(Self::UpdateComment),
            "delete_comment" => Some(Self::DeleteComment),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ContentModule;

impl ContentModule {
    async fn run(&self, op: Operation, ctx: &SiteContext) -> Result<Value, ContentError> {
        let content = &ctx.services.content;
        let input = ctx.form();
        let user = &ctx.user;

        match op {
            Operation::Insert => {
                let kind = input.first_non_empty(TYPE_FIELD);
                let options = TypeOptions::resolve(&ctx.config, kind)?;
                options.authorize(user)?;
                let id = content.insert(&options.rules, input, user).await?;
                Ok(json!({ ID_PARAM: id }))
            }
            Operation::Update => {
                let Some(raw_id) = input.first_non_empty(ID_PARAM) else {
                    return Err(ContentError::NoId);
                };
                let options = self.stored_options(ctx, parse_id(raw_id)?).await?;
                options.authorize(user)?;
                let id = content.update(&options.rules, input, user).await?;
                Ok(json!({ ID_PARAM: id }))
            }
            Operation::Delete => {
                let ids = input.all(ID_PARAM);
                if ids.is_empty() {
                    return Err(ContentError::MissingFields(vec![ID_PARAM.to_string()]));
                }
                let mut report = Vec::with_capacity(ids.len());
                for raw in ids {
                    let entry = match self.delete_authorized(ctx, raw).await {
                        Ok(()) => json!({ ID_PARAM: raw, "ok": true }),
                        Err(err @ ContentError::Repo(_)) => return Err(err),
                        Err(err) => json!({ ID_PARAM: raw, "error": err.to_string() }),
                    };
                    report.push(entry);
                }
                Ok(Value::Array(report))
            }
            Operation::InsertComment | Operation::UpdateComment | Operation::DeleteComment => {
                let options = self.parent_options(ctx).await?;
                content.allows_comment(input, &options.options, user).await?;
                match op {
                    Operation::InsertComment => {
                        let comment_id = content
                            .insert_comment(&options.comment_rules, input, user)
                            .await?;
                        Ok(json!({
                            CONTENT_ID_PARAM: input.first_non_empty(CONTENT_ID_PARAM),
                            "comment_id": comment_id,
                        }))
                    }
                    Operation::UpdateComment => {
                        content
                            .update_comment(&options.comment_rules, input, user)
                            .await?;
                        Ok(json!({ "ok": true }))
                    }
                    _ => {
                        content.delete_comment(input, user).await?;
                        Ok(json!({ "ok": true }))
                    }
                }
            }
        }
    }

    /// Options of the type stored on the addressed content.
    async fn stored_options(
        &self,
        ctx: &SiteContext,
        id: DocumentId,
    ) -> Result<TypeOptions, ContentError> {
        let stored = ctx
            .services
            .content
            .find_by_id(id)
            .await?
            .ok_or(ContentError::ContentNotFound)?;
        let kind = stored.get(TYPE_FIELD).and_then(Value::as_str);
        Ok(TypeOptions::resolve(&ctx.config, kind)?)
    }

    /// Options of the type of the content a comment operation addresses.
    async fn parent_options(&self, ctx: &SiteContext) -> Result<TypeOptions, ContentError> {
        let ids = extract_ids(ctx.form(), &[CONTENT_ID_PARAM])?;
        self.stored_options(ctx, ids[0]).await
    }

    async fn delete_authorized(&self, ctx: &SiteContext, raw: &str) -> Result<(), ContentError> {
        let options = self.stored_options(ctx, parse_id(raw)?).await?;
        options.authorize(&ctx.user)?;
        ctx.services.content.delete_one(raw, &ctx.user).await
    }
}

fn parse_id(raw: &str) -> Result<DocumentId, ContentError> {
    DocumentId::parse(raw).map_err(|_| ContentError::InvalidId {
        field: ID_PARAM.to_string(),
    })
}

#[async_trait]
impl FrontHook for ContentModule {
    async fn front(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        if ctx.segment(1) != Some(MODULE_NAME) {
            return Ok(());
        }
        let Some(key) = ctx.segment(2).map(str::to_owned) else {
            return Ok(());
        };

        match ctx.services.content.find_content(&FRONT_KEYS, &key).await? {
            Some(document) => ctx.set_result(Value::Object(document)),
            None => ctx.set_error(ContentError::ContentNotFound),
        }
        ctx.hijack();
        Ok(())
    }
}

#[async_trait]
impl BackHook for ContentModule {
    async fn back(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        if ctx.segment(1) != Some(BACK_SEGMENT) || ctx.segment(2) != Some(MODULE_NAME) {
            return Ok(());
        }
        let Some(op) = ctx.segment(3).and_then(Operation::parse) else {
            return Ok(());
        };

        ctx.hijack();
        match self.run(op, ctx).await {
            Ok(result) => ctx.set_result(result),
            Err(ContentError::Repo(err)) => return Err(err.into()),
            Err(err) => ctx.set_error(err),
        }
        Ok(())
    }
}

#[async_trait]
impl TestHook for ContentModule {
    async fn test(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        let listed = |path: &str| -> Result<bool, HookError> {
            ctx.config
                .string_list(path)
                .map(|names| names.iter().any(|name| name == MODULE_NAME))
                .map_err(|err| HookError::failed(err.to_string()))
        };
        let front = listed(FRONT_HOOKS_PATH)?;
        let back = listed(BACK_HOOKS_PATH)?;

        let mut types = Map::new();
        let mut ok = front && back;
        if let Some(configured) = ctx.config.section(TYPES_PATH) {
            for (name, options) in configured {
                let verdict = check_type(options);
                ok &= verdict.is_none();
                types.insert(
                    name.clone(),
                    verdict.map_or(Value::from("ok"), Value::from),
                );
            }
        }

        ctx.set_result(json!({
            "module": MODULE_NAME,
            "front": front,
            "back": back,
            "types": types,
            "ok": ok,
        }));
        Ok(())
    }
}

/// Problem with a configured type, if any.
fn check_type(options: &Value) -> Option<String> {
    let Some(options) = options.as_object() else {
        return Some("type options must be an object".to_string());
    };
    match options.get(RULES_KEY) {
        Some(Value::Object(_)) => {}
        Some(_) => return Some(format!("`{RULES_KEY}` must be an object")),
        None => return Some(format!("`{RULES_KEY}` is not set")),
    }
    TypeOptions::from_options(options.clone())
        .err()
        .map(|err| err.to_string())
}
