//! Built-in modules and the registry wiring them under their names.

pub mod admin;
pub mod content;
pub mod user;

use std::sync::Arc;

use crate::application::{dispatch::Dispatcher, hooks::HookRegistry};

use self::{admin::AdminHooks, content::ContentModule, user::UserModule};

/// Registry with every built-in module registered under its module name.
pub fn default_registry() -> HookRegistry {
    let user = Arc::new(UserModule);
    let content = Arc::new(ContentModule);

    let mut registry = HookRegistry::new();
    registry
        .register_build_user(user::MODULE_NAME, user.clone())
        .register_test(user::MODULE_NAME, user)
        .register_front(content::MODULE_NAME, content.clone())
        .register_back(content::MODULE_NAME, content.clone())
        .register_test(content::MODULE_NAME, content);
    registry
}

pub fn default_dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(default_registry()), Arc::new(AdminHooks))
}
