//! Request dispatch: build the user, then route on the first path segment.
//!
//! - `/b/...` runs the configured back chain and ends in result delivery.
//! - `/admin[/b]/...` runs the privileged admin module, bypassing the hook lists.
//! - `/debug/<module>` runs the module's test hook and ends in result delivery.
//! - anything else runs the configured front chain and ends in display.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::{
    application::{
        context::SiteContext,
        hooks::{AdminModule, HookError, HookPhase, HookRegistry},
    },
    domain::site_config::{BACK_HOOKS_PATH, FRONT_HOOKS_PATH},
};

pub const USER_MODULE: &str = "user";
pub const BACK_SEGMENT: &str = "b";
pub const ADMIN_SEGMENT: &str = "admin";
pub const DEBUG_SEGMENT: &str = "debug";

/// How the response for a successfully dispatched request is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Render the populated context.
    Display,
    /// Emit the result payload as JSON or redirect.
    Deliver,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("user module does not export build hook")]
    NoBuildUserHook,
    #[error("{name} module does not export {phase} hook")]
    UnknownHook { name: String, phase: HookPhase },
    #[error("back hooks are not set properly (either unset or empty list)")]
    BackHooksNotSet,
    #[error("none of the back hooks hijacked control")]
    NoBackHijacked,
    #[error("hook list is malformed: {reason}")]
    InvalidHookList { reason: String },
    #[error("debug route requires a module name")]
    MissingDebugModule,
    #[error("{phase} hook of {name} module failed: {source}")]
    Hook {
        name: String,
        phase: HookPhase,
        #[source]
        source: HookError,
    },
}

impl DispatchError {
    fn hook(name: &str, phase: HookPhase, source: HookError) -> Self {
        Self::Hook {
            name: name.to_string(),
            phase,
            source,
        }
    }

    /// Whether a hook asked to end the request without exposing details.
    pub fn is_halt(&self) -> bool {
        matches!(
            self,
            DispatchError::Hook {
                source: HookError::Halt { .. },
                ..
            }
        )
    }
}

pub struct Dispatcher {
    registry: Arc<HookRegistry>,
    admin: Arc<dyn AdminModule>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HookRegistry>, admin: Arc<dyn AdminModule>) -> Self {
        Self { registry, admin }
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    pub async fn run(&self, ctx: &mut SiteContext) -> Result<Outcome, DispatchError> {
        let build_user = self
            .registry
            .build_user(USER_MODULE)
            .map_err(|_| DispatchError::NoBuildUserHook)?;
        build_user
            .build_user(ctx)
            .await
            .map_err(|err| DispatchError::hook(USER_MODULE, HookPhase::BuildUser, err))?;

        let first = ctx.segment(1).map(str::to_owned);
        match first.as_deref() {
            Some(BACK_SEGMENT) => self.run_back_chain(ctx).await,
            Some(ADMIN_SEGMENT) => self.run_admin(ctx).await,
            Some(DEBUG_SEGMENT) => self.run_debug(ctx).await,
            _ => self.run_front_chain(ctx).await,
        }
    }

    async fn run_front_chain(&self, ctx: &mut SiteContext) -> Result<Outcome, DispatchError> {
        let names = hook_list(ctx, FRONT_HOOKS_PATH)?;
        for name in &names {
            let hook = self.registry.front(name)?;
            trace_hook(ctx, name, HookPhase::Front);
            hook.front(ctx)
                .await
                .map_err(|err| DispatchError::hook(name, HookPhase::Front, err))?;
            if ctx.hijacked {
                break;
            }
        }
        Ok(Outcome::Display)
    }

    async fn run_back_chain(&self, ctx: &mut SiteContext) -> Result<Outcome, DispatchError> {
        let names = hook_list(ctx, BACK_HOOKS_PATH)?;
        if names.is_empty() {
            return Err(DispatchError::BackHooksNotSet);
        }
        for name in &names {
            let hook = self.registry.back(name)?;
            trace_hook(ctx, name, HookPhase::Back);
            hook.back(ctx)
                .await
                .map_err(|err| DispatchError::hook(name, HookPhase::Back, err))?;
            if ctx.hijacked {
                return Ok(Outcome::Deliver);
            }
        }
        Err(DispatchError::NoBackHijacked)
    }

    async fn run_admin(&self, ctx: &mut SiteContext) -> Result<Outcome, DispatchError> {
        if ctx.segment(2) == Some(BACK_SEGMENT) {
            self.admin
                .back(ctx)
                .await
                .map_err(|err| DispatchError::hook(ADMIN_SEGMENT, HookPhase::Back, err))?;
            Ok(Outcome::Deliver)
        } else {
            self.admin
                .display(ctx)
                .await
                .map_err(|err| DispatchError::hook(ADMIN_SEGMENT, HookPhase::Front, err))?;
            Ok(Outcome::Display)
        }
    }

    async fn run_debug(&self, ctx: &mut SiteContext) -> Result<Outcome, DispatchError> {
        let module = ctx
            .segment(2)
            .map(str::to_owned)
            .ok_or(DispatchError::MissingDebugModule)?;
        let hook = self.registry.test(&module)?;
        trace_hook(ctx, &module, HookPhase::Test);
        hook.test(ctx)
            .await
            .map_err(|err| DispatchError::hook(&module, HookPhase::Test, err))?;
        Ok(Outcome::Deliver)
    }
}

fn hook_list(ctx: &SiteContext, path: &str) -> Result<Vec<String>, DispatchError> {
    ctx.config
        .string_list(path)
        .map_err(|err| DispatchError::InvalidHookList {
            reason: err.to_string(),
        })
}

fn trace_hook(ctx: &SiteContext, name: &str, phase: HookPhase) {
    debug!(
        target = "sitehook::dispatch",
        host = ctx.host(),
        hook = name,
        phase = phase.as_str(),
        "Running hook"
    );
}
