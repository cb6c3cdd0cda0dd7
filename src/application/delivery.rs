//! Result delivery after a mutating chain: JSON for API callers, 303 redirect for forms.

use serde_json::Value;

use crate::application::context::SiteContext;

pub const JSON_PARAM: &str = "json";
pub const REDIRECT_PARAM: &str = "redirect";
const FALLBACK_REDIRECT: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Json(String),
    Redirect(String),
}

/// Decide how the result payload leaves the server.
///
/// Redirect target precedence: context `redirect`, then the first `redirect` parameter, then
/// the referer, then `/`.
pub fn deliver(ctx: &SiteContext) -> Result<Delivery, serde_json::Error> {
    if ctx.form().contains(JSON_PARAM) {
        let payload = ctx.result.as_ref().unwrap_or(&Value::Null);
        return serde_json::to_string(payload).map(Delivery::Json);
    }

    let target = ctx
        .redirect
        .as_deref()
        .or_else(|| ctx.form().first_non_empty(REDIRECT_PARAM))
        .or_else(|| ctx.request.referer())
        .unwrap_or(FALLBACK_REDIRECT);
    Ok(Delivery::Redirect(target.to_string()))
}
