//! Per-request site context threaded through every hook.

use std::{collections::HashMap, fmt, sync::Arc};

use axum::http::{HeaderMap, Method};
use serde_json::{Value, json};

use crate::{
    application::services::AppServices,
    domain::{form::FormInput, site_config::SiteConfig, user::User},
};

/// The parts of the incoming request hooks are allowed to see.
#[derive(Debug, Clone)]
pub struct RequestData {
    pub host: String,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub form: FormInput,
}

impl RequestData {
    pub fn new(host: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            form: FormInput::new(),
        }
    }

    pub fn with_form(mut self, form: FormInput) -> Self {
        self.form = form;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    pub fn referer(&self) -> Option<&str> {
        self.header("referer")
    }
}

/// Plain-text lines written by hooks, emitted ahead of the final response body.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    lines: Vec<String>,
}

impl OutputBuffer {
    pub fn put(&mut self, line: impl fmt::Display) {
        self.lines.push(line.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Lives for exactly one request; never shared between requests.
pub struct SiteContext {
    pub services: Arc<AppServices>,
    pub request: RequestData,
    pub config: SiteConfig,
    /// `request.path` split on `/`; index 0 is the empty segment before the leading slash.
    pub paths: Vec<String>,
    pub user: User,
    pub output: OutputBuffer,
    /// Set by the hook that takes responsibility for the response; stops the chain.
    pub hijacked: bool,
    pub redirect: Option<String>,
    pub result: Option<Value>,
    /// Module specific values passed between hooks.
    pub extensions: HashMap<String, Value>,
}

impl SiteContext {
    pub fn new(services: Arc<AppServices>, request: RequestData, config: SiteConfig) -> Self {
        let paths = request.path.split('/').map(str::to_owned).collect();
        Self {
            services,
            request,
            config,
            paths,
            user: User::anonymous(),
            output: OutputBuffer::default(),
            hijacked: false,
            redirect: None,
            result: None,
            extensions: HashMap::new(),
        }
    }

    pub fn segment(&self, index: usize) -> Option<&str> {
        self.paths
            .get(index)
            .map(String::as_str)
            .filter(|segment| !segment.is_empty())
    }

    pub fn host(&self) -> &str {
        &self.request.host
    }

    pub fn form(&self) -> &FormInput {
        &self.request.form
    }

    pub fn hijack(&mut self) {
        self.hijacked = true;
    }

    pub fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }

    /// Record a user-facing failure in the result payload.
    pub fn set_error(&mut self, message: impl fmt::Display) {
        self.result = Some(json!({ "error": message.to_string() }));
    }

    pub fn put(&mut self, line: impl fmt::Display) {
        self.output.put(line);
    }
}
