use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::Value;
use thiserror::Error;

use crate::application::{context::SiteContext, error::HttpError};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// What the display step shows for a finished front chain or admin display.
#[derive(Debug, Clone)]
pub struct DisplayView {
    pub title: String,
    pub host: String,
    pub path: String,
    pub user_level: Option<i32>,
    pub output: Vec<String>,
    pub error: Option<String>,
    pub result: Option<String>,
}

impl DisplayView {
    pub fn from_context(ctx: &SiteContext) -> Self {
        let error = ctx
            .result
            .as_ref()
            .and_then(|result| result.get("error"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        let result = match (&error, ctx.result.as_ref()) {
            (None, Some(value)) => serde_json::to_string_pretty(value).ok(),
            _ => None,
        };
        let title = ctx
            .result
            .as_ref()
            .and_then(|result| result.get("title"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| ctx.host().to_string());

        Self {
            title,
            host: ctx.host().to_string(),
            path: ctx.request.path.clone(),
            user_level: (!ctx.user.is_anonymous()).then_some(ctx.user.level),
            output: ctx.output.lines().to_vec(),
            error,
            result,
        }
    }
}

#[derive(Template)]
#[template(path = "display.html")]
pub struct DisplayTemplate {
    pub view: DisplayView,
}

/// Render the display step for `ctx`.
pub fn render_display(ctx: &SiteContext) -> Response {
    let view = DisplayView::from_context(ctx);
    render_template_response(DisplayTemplate { view }, StatusCode::OK)
}
