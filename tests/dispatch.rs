mod support;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use serde_json::json;
use sitehook::{
    application::{
        context::SiteContext,
        delivery::{Delivery, deliver},
        dispatch::{DispatchError, Dispatcher, Outcome},
        hooks::{BackHook, FrontHook, HookError, HookPhase, HookRegistry},
        modules::{admin::AdminHooks, default_dispatcher, default_registry},
    },
    domain::{form::FormInput, site_config::SiteConfig},
};

use support::{MemoryStore, config, context, services};

type Log = Arc<Mutex<Vec<String>>>;

struct Probe {
    name: &'static str,
    hijack: bool,
    log: Log,
}

impl Probe {
    fn new(name: &'static str, hijack: bool, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            name,
            hijack,
            log: log.clone(),
        })
    }

    fn record(&self, ctx: &mut SiteContext) {
        self.log
            .lock()
            .expect("log lock")
            .push(self.name.to_string());
        if self.hijack {
            ctx.set_result(json!({ "handled_by": self.name }));
            ctx.hijack();
        }
    }
}

#[async_trait]
impl FrontHook for Probe {
    async fn front(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        self.record(ctx);
        Ok(())
    }
}

#[async_trait]
impl BackHook for Probe {
    async fn back(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        self.record(ctx);
        Ok(())
    }
}

struct Halting;

#[async_trait]
impl FrontHook for Halting {
    async fn front(&self, _ctx: &mut SiteContext) -> Result<(), HookError> {
        Err(HookError::halt("nothing to see here"))
    }
}

fn probing_dispatcher(log: &Log) -> Dispatcher {
    let mut registry = default_registry();
    registry
        .register_front("a", Probe::new("a", false, log))
        .register_front("b", Probe::new("b", true, log))
        .register_front("c", Probe::new("c", false, log))
        .register_front("halt", Arc::new(Halting))
        .register_back("pass", Probe::new("pass", false, log))
        .register_back("take", Probe::new("take", true, log));
    Dispatcher::new(Arc::new(registry), Arc::new(AdminHooks))
}

fn ran(log: &Log) -> Vec<String> {
    log.lock().expect("log lock").clone()
}

#[tokio::test]
async fn front_without_hooks_displays_immediately() {
    let store = MemoryStore::new();
    let log = Log::default();
    let dispatcher = probing_dispatcher(&log);

    for site in [
        SiteConfig::empty(),
        config(json!({ "Hooks": { "Front": [] } })),
    ] {
        let mut ctx = context(services(&store), "/anything", FormInput::new(), site);
        let outcome = dispatcher.run(&mut ctx).await.expect("dispatch");
        assert_eq!(outcome, Outcome::Display);
        assert!(ctx.result.is_none());
    }
    assert!(ran(&log).is_empty());
}

#[tokio::test]
async fn front_chain_runs_in_order_until_hijacked() {
    let store = MemoryStore::new();
    let log = Log::default();
    let dispatcher = probing_dispatcher(&log);
    let site = config(json!({ "Hooks": { "Front": ["a", "b", "c"] } }));

    let mut ctx = context(services(&store), "/page", FormInput::new(), site);
    let outcome = dispatcher.run(&mut ctx).await.expect("dispatch");

    assert_eq!(outcome, Outcome::Display);
    assert_eq!(ran(&log), ["a", "b"]);
    assert_eq!(ctx.result, Some(json!({ "handled_by": "b" })));
}

#[tokio::test]
async fn unregistered_front_hook_is_reported_by_name() {
    let store = MemoryStore::new();
    let dispatcher = default_dispatcher();
    let site = config(json!({ "Hooks": { "Front": ["missing"] } }));

    let mut ctx = context(services(&store), "/", FormInput::new(), site);
    let err = dispatcher.run(&mut ctx).await.expect_err("unknown hook");

    assert!(matches!(
        err,
        DispatchError::UnknownHook {
            phase: HookPhase::Front,
            ..
        }
    ));
    assert_eq!(err.to_string(), "missing module does not export Front hook");
}

#[tokio::test]
async fn back_chain_requires_a_hook_list() {
    let store = MemoryStore::new();
    let dispatcher = default_dispatcher();

    for site in [
        SiteConfig::empty(),
        config(json!({ "Hooks": { "Back": [] } })),
    ] {
        let mut ctx = context(services(&store), "/b/content/insert", FormInput::new(), site);
        let err = dispatcher.run(&mut ctx).await.expect_err("no back hooks");
        assert!(matches!(err, DispatchError::BackHooksNotSet));
        assert_eq!(
            err.to_string(),
            "back hooks are not set properly (either unset or empty list)"
        );
    }
}

#[tokio::test]
async fn back_chain_without_hijacker_never_delivers() {
    let store = MemoryStore::new();
    let log = Log::default();
    let dispatcher = probing_dispatcher(&log);
    let site = config(json!({ "Hooks": { "Back": ["pass", "pass"] } }));

    let mut ctx = context(services(&store), "/b/anything", FormInput::new(), site);
    let err = dispatcher.run(&mut ctx).await.expect_err("nobody hijacked");

    assert!(matches!(err, DispatchError::NoBackHijacked));
    assert_eq!(err.to_string(), "none of the back hooks hijacked control");
    assert_eq!(ran(&log), ["pass", "pass"]);
    assert!(ctx.result.is_none());
}

#[tokio::test]
async fn back_chain_stops_at_the_hijacker() {
    let store = MemoryStore::new();
    let log = Log::default();
    let dispatcher = probing_dispatcher(&log);
    let site = config(json!({ "Hooks": { "Back": ["pass", "take", "pass"] } }));

    let mut ctx = context(services(&store), "/b/anything", FormInput::new(), site);
    let outcome = dispatcher.run(&mut ctx).await.expect("dispatch");

    assert_eq!(outcome, Outcome::Deliver);
    assert_eq!(ran(&log), ["pass", "take"]);
}

#[tokio::test]
async fn missing_user_module_aborts_before_routing() {
    let store = MemoryStore::new();
    let log = Log::default();
    let mut registry = HookRegistry::new();
    registry.register_front("a", Probe::new("a", false, &log));
    let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(AdminHooks));
    let site = config(json!({ "Hooks": { "Front": ["a"] } }));

    let mut ctx = context(services(&store), "/", FormInput::new(), site);
    let err = dispatcher.run(&mut ctx).await.expect_err("no build hook");

    assert!(matches!(err, DispatchError::NoBuildUserHook));
    assert_eq!(err.to_string(), "user module does not export build hook");
    assert!(ran(&log).is_empty());
}

#[tokio::test]
async fn halting_hook_is_flagged_as_halt() {
    let store = MemoryStore::new();
    let dispatcher = probing_dispatcher(&Log::default());
    let site = config(json!({ "Hooks": { "Front": ["halt"] } }));

    let mut ctx = context(services(&store), "/", FormInput::new(), site);
    let err = dispatcher.run(&mut ctx).await.expect_err("halted");

    assert!(err.is_halt());
    assert!(!DispatchError::NoBackHijacked.is_halt());
}

#[tokio::test]
async fn debug_route_runs_the_module_test_hook() {
    let store = MemoryStore::new();
    let dispatcher = default_dispatcher();
    let site = config(json!({
        "Hooks": { "Front": ["content"], "Back": ["content"] },
        "content": { "types": {
            "page": { "rules": { "title": 1 } },
            "broken": { "rules": "title" },
        }},
    }));

    let mut ctx = context(services(&store), "/debug/content", FormInput::new(), site);
    let outcome = dispatcher.run(&mut ctx).await.expect("dispatch");

    assert_eq!(outcome, Outcome::Deliver);
    let result = ctx.result.expect("test result");
    assert_eq!(result["front"], json!(true));
    assert_eq!(result["back"], json!(true));
    assert_eq!(result["types"]["page"], json!("ok"));
    assert!(result["types"]["broken"].is_string());
    assert_eq!(result["ok"], json!(false));

    let mut ctx = context(services(&store), "/debug", FormInput::new(), SiteConfig::empty());
    assert!(matches!(
        dispatcher.run(&mut ctx).await,
        Err(DispatchError::MissingDebugModule)
    ));

    let mut ctx = context(services(&store), "/debug/nope", FormInput::new(), SiteConfig::empty());
    assert!(matches!(
        dispatcher.run(&mut ctx).await,
        Err(DispatchError::UnknownHook {
            phase: HookPhase::Test,
            ..
        })
    ));
}

#[tokio::test]
async fn admin_routes_ignore_hook_lists_and_require_admins() {
    let store = MemoryStore::new();
    let admin_token = "admin-token";
    store.add_user(admin_token, 300).await;
    let dispatcher = default_dispatcher();
    let site = config(json!({ "Hooks": { "Front": ["missing"] }, "title": "Site" }));

    let mut ctx = context(services(&store), "/admin", FormInput::new(), site.clone());
    assert_eq!(
        dispatcher.run(&mut ctx).await.expect("anonymous display"),
        Outcome::Display
    );
    assert!(ctx.result.expect("refusal")["error"].is_string());

    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer admin-token"),
    );
    let mut ctx = context(services(&store), "/admin", FormInput::new(), site);
    ctx.request.headers = headers;
    assert_eq!(
        dispatcher.run(&mut ctx).await.expect("admin display"),
        Outcome::Display
    );
    let result = ctx.result.expect("config");
    assert_eq!(result["host"], json!("example.test"));
    assert_eq!(result["config"]["title"], json!("Site"));
}

#[tokio::test]
async fn admin_back_saves_configuration_for_the_host() {
    let store = MemoryStore::new();
    store.add_user("root", 300).await;
    let services = services(&store);
    let dispatcher = default_dispatcher();

    let form = FormInput::new()
        .with("config", r#"{"Hooks":{"Front":["content"]}}"#)
        .with("json", "");
    let mut ctx = context(services.clone(), "/admin/b/save_config", form, SiteConfig::empty());
    ctx.request
        .headers
        .insert(header::COOKIE, HeaderValue::from_static("session=root"));

    assert_eq!(
        dispatcher.run(&mut ctx).await.expect("save"),
        Outcome::Deliver
    );
    assert!(ctx.hijacked);
    assert_eq!(ctx.result, Some(json!({ "ok": true })));

    let saved = services.sites.resolve("example.test").await.expect("saved");
    assert_eq!(
        saved.string_list("Hooks.Front").expect("list"),
        vec!["content".to_string()]
    );

    let form = FormInput::new().with("config", "[1, 2]");
    let mut ctx = context(services.clone(), "/admin/b/save_config", form, SiteConfig::empty());
    ctx.request
        .headers
        .insert(header::COOKIE, HeaderValue::from_static("session=root"));
    dispatcher.run(&mut ctx).await.expect("rejected save");
    assert!(ctx.result.expect("error")["error"].is_string());
}

#[tokio::test]
async fn delivery_prefers_json_then_redirect_targets() {
    let store = MemoryStore::new();
    let services = services(&store);

    let mut ctx = context(
        services.clone(),
        "/b/x",
        FormInput::new().with("json", "1"),
        SiteConfig::empty(),
    );
    assert_eq!(deliver(&ctx).expect("json"), Delivery::Json("null".into()));
    ctx.set_result(json!({ "id": 7 }));
    assert_eq!(
        deliver(&ctx).expect("json"),
        Delivery::Json(r#"{"id":7}"#.into())
    );

    let mut ctx = context(
        services.clone(),
        "/b/x",
        FormInput::new().with("redirect", "/from-form"),
        SiteConfig::empty(),
    );
    ctx.request
        .headers
        .insert(header::REFERER, HeaderValue::from_static("/from-referer"));
    assert_eq!(
        deliver(&ctx).expect("redirect"),
        Delivery::Redirect("/from-form".into())
    );
    ctx.redirect = Some("/from-hook".into());
    assert_eq!(
        deliver(&ctx).expect("redirect"),
        Delivery::Redirect("/from-hook".into())
    );

    let mut ctx = context(services.clone(), "/b/x", FormInput::new(), SiteConfig::empty());
    assert_eq!(
        deliver(&ctx).expect("redirect"),
        Delivery::Redirect("/".into())
    );
    ctx.request
        .headers
        .insert(header::REFERER, HeaderValue::from_static("/back"));
    assert_eq!(
        deliver(&ctx).expect("redirect"),
        Delivery::Redirect("/back".into())
    );
}
