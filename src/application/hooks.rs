//! Hook capabilities and the registry mapping module names to handlers.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::application::{
    content::ContentError, context::SiteContext, dispatch::DispatchError, repos::RepoError,
    site::SiteError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Front,
    Back,
    Test,
    BuildUser,
}

impl HookPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPhase::Front => "Front",
            HookPhase::Back => "Back",
            HookPhase::Test => "Test",
            HookPhase::BuildUser => "BuildUser",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    /// Intentional early exit: the request ends with the generic apology and no detail.
    #[error("request halted: {reason}")]
    Halt { reason: String },
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("{0}")]
    Failed(String),
}

impl HookError {
    pub fn halt(reason: impl Into<String>) -> Self {
        Self::Halt {
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Read-only hooks run for every path outside `/b`, `/admin` and `/debug`.
#[async_trait]
pub trait FrontHook: Send + Sync {
    async fn front(&self, ctx: &mut SiteContext) -> Result<(), HookError>;
}

/// Mutating hooks run under `/b`; exactly one must hijack the request.
#[async_trait]
pub trait BackHook: Send + Sync {
    async fn back(&self, ctx: &mut SiteContext) -> Result<(), HookError>;
}

/// Self check of a module against the site configuration, reachable under `/debug/<module>`.
#[async_trait]
pub trait TestHook: Send + Sync {
    async fn test(&self, ctx: &mut SiteContext) -> Result<(), HookError>;
}

/// Establishes the acting user before any routing happens.
#[async_trait]
pub trait BuildUserHook: Send + Sync {
    async fn build_user(&self, ctx: &mut SiteContext) -> Result<(), HookError>;
}

/// The privileged admin module; it is not looked up by name and ignores the hook lists.
#[async_trait]
pub trait AdminModule: Send + Sync {
    async fn display(&self, ctx: &mut SiteContext) -> Result<(), HookError>;

    async fn back(&self, ctx: &mut SiteContext) -> Result<(), HookError>;
}

/// Populated at startup, read-only afterwards.
#[derive(Clone, Default)]
pub struct HookRegistry {
    front: HashMap<String, Arc<dyn FrontHook>>,
    back: HashMap<String, Arc<dyn BackHook>>,
    test: HashMap<String, Arc<dyn TestHook>>,
    build_user: HashMap<String, Arc<dyn BuildUserHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_front(
        &mut self,
        name: impl Into<String>,
        hook: Arc<dyn FrontHook>,
    ) -> &mut Self {
        self.front.insert(name.into(), hook);
        self
    }

    pub fn register_back(&mut self, name: impl Into<String>, hook: Arc<dyn BackHook>) -> &mut Self {
        self.back.insert(name.into(), hook);
        self
    }

    pub fn register_test(&mut self, name: impl Into<String>, hook: Arc<dyn TestHook>) -> &mut Self {
        self.test.insert(name.into(), hook);
        self
    }

    pub fn register_build_user(
        &mut self,
        name: impl Into<String>,
        hook: Arc<dyn BuildUserHook>,
    ) -> &mut Self {
        self.build_user.insert(name.into(), hook);
        self
    }

    pub fn front(&self, name: &str) -> Result<Arc<dyn FrontHook>, DispatchError> {
        lookup(&self.front, name, HookPhase::Front)
    }

    pub fn back(&self, name: &str) -> Result<Arc<dyn BackHook>, DispatchError> {
        lookup(&self.back, name, HookPhase::Back)
    }

    pub fn test(&self, name: &str) -> Result<Arc<dyn TestHook>, DispatchError> {
        lookup(&self.test, name, HookPhase::Test)
    }

    pub fn build_user(&self, name: &str) -> Result<Arc<dyn BuildUserHook>, DispatchError> {
        lookup(&self.build_user, name, HookPhase::BuildUser)
    }

    /// Names registered for `phase`, sorted.
    pub fn names(&self, phase: HookPhase) -> Vec<&str> {
        let mut names: Vec<&str> = match phase {
            HookPhase::Front => self.front.keys().map(String::as_str).collect(),
            HookPhase::Back => self.back.keys().map(String::as_str).collect(),
            HookPhase::Test => self.test.keys().map(String::as_str).collect(),
            HookPhase::BuildUser => self.build_user.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }
}

fn lookup<T: ?Sized>(
    hooks: &HashMap<String, Arc<T>>,
    name: &str,
    phase: HookPhase,
) -> Result<Arc<T>, DispatchError> {
    hooks
        .get(name)
        .cloned()
        .ok_or_else(|| DispatchError::UnknownHook {
            name: name.to_string(),
            phase,
        })
}
