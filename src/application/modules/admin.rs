//! The privileged admin module behind `/admin` and `/admin/b/...`.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    application::{
        context::SiteContext,
        hooks::{AdminModule, HookError},
    },
    domain::{site_config::SiteConfig, user::ADMIN_LEVEL},
};

pub const CONFIG_PARAM: &str = "config";
pub const SAVE_CONFIG_OP: &str = "save_config";
pub const EVICT_CACHE_OP: &str = "evict_cache";

#[derive(Debug, Default)]
pub struct AdminHooks;

impl AdminHooks {
    /// Refuse non-admins; the refusal is recorded in the result payload.
    fn authorize(ctx: &mut SiteContext) -> bool {
        if ctx.user.is_admin() {
            return true;
        }
        warn!(
            target = "sitehook::modules::admin",
            host = ctx.host(),
            level = ctx.user.level,
            "Admin route refused"
        );
        ctx.set_error(format!(
            "you have no rights to do this: level {ADMIN_LEVEL} required, {} held",
            ctx.user.level
        ));
        false
    }

    async fn save_config(ctx: &mut SiteContext) -> Result<(), HookError> {
        let Some(raw) = ctx.form().first_non_empty(CONFIG_PARAM) else {
            ctx.set_error(format!("missing fields: {CONFIG_PARAM}"));
            return Ok(());
        };
        let parsed = serde_json::from_str::<Value>(raw)
            .map_err(|err| err.to_string())
            .and_then(|value| SiteConfig::from_value(value).map_err(|err| err.to_string()));
        let config = match parsed {
            Ok(config) => config,
            Err(reason) => {
                ctx.set_error(format!("`{CONFIG_PARAM}` is not a valid configuration: {reason}"));
                return Ok(());
            }
        };

        let host = ctx.host().to_string();
        ctx.services.sites.save(&host, &config).await?;
        ctx.set_result(json!({ "ok": true }));
        Ok(())
    }

    fn evict_cache(ctx: &mut SiteContext) {
        let host = ctx.host().to_string();
        let evicted = ctx.services.sites.evict(&host);
        info!(
            target = "sitehook::modules::admin",
            host = %host,
            evicted,
            "Evicted site configuration"
        );
        ctx.set_result(json!({ "evicted": evicted }));
    }
}

#[async_trait]
impl AdminModule for AdminHooks {
    async fn display(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        if !Self::authorize(ctx) {
            return Ok(());
        }
        let config = Value::Object(ctx.config.as_document().clone());
        let host = ctx.host().to_string();
        ctx.set_result(json!({ "host": host, "config": config }));
        Ok(())
    }

    async fn back(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        ctx.hijack();
        if !Self::authorize(ctx) {
            return Ok(());
        }
        match ctx.segment(3).map(str::to_owned).as_deref() {
            Some(SAVE_CONFIG_OP) => Self::save_config(ctx).await,
            Some(EVICT_CACHE_OP) => {
                Self::evict_cache(ctx);
                Ok(())
            }
            Some(other) => {
                ctx.set_error(format!("unknown admin operation `{other}`"));
                Ok(())
            }
            None => {
                ctx.set_error("admin operation not specified");
                Ok(())
            }
        }
    }
}
