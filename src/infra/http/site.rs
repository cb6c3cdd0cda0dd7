//! The single wildcard route: every request is resolved to a site and dispatched through hooks.

use std::{panic::AssertUnwindSafe, sync::Arc};

use axum::{
    Router,
    body::{self, Body},
    extract::State,
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware,
    response::{IntoResponse, Redirect, Response},
};
use futures::FutureExt;
use metrics::counter;
use tracing::{error, warn};

use crate::{
    application::{
        context::{RequestData, SiteContext},
        delivery::{Delivery, deliver},
        dispatch::{DispatchError, Dispatcher, Outcome},
        error::{ErrorReport, HttpError},
        services::AppServices,
    },
    domain::form::FormInput,
    infra::telemetry::panic_message,
    presentation::views::render_display,
};

use super::middleware::{RequestContext, log_responses, set_request_context};

pub const APOLOGY: &str =
    "an unfortunate error has happened. we are deeply sorry for the inconvenience.";

const SOURCE: &str = "infra::http::site";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Clone)]
pub struct SiteState {
    pub services: Arc<AppServices>,
    pub dispatcher: Arc<Dispatcher>,
    pub body_limit: usize,
}

pub fn build_router(state: SiteState) -> Router {
    Router::new()
        .fallback(handle_site)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// One recovery point per request: a panic anywhere below ends in the apology.
async fn handle_site(State(state): State<SiteState>, request: axum::extract::Request) -> Response {
    let debug = state.services.debug;
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    match AssertUnwindSafe(serve_site(state, request))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            counter!("sitehook_request_panic_total").increment(1);
            error!(
                target = "sitehook::http::site",
                request_id = %request_id,
                panic = %message,
                "Request panicked"
            );
            apology(debug.then_some(message.as_str()), "request panicked", &message)
        }
    }
}

async fn serve_site(state: SiteState, request: axum::extract::Request) -> Response {
    let (parts, body) = request.into_parts();
    let host = request_host(&parts);

    let form = match read_form(&parts, body, state.body_limit).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let config = match state.services.sites.resolve(&host).await {
        Ok(config) => config,
        Err(err) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                &err,
            )
            .into_response();
        }
    };

    let Parts {
        method,
        uri,
        headers,
        ..
    } = parts;
    let request = RequestData::new(host, method, uri.path())
        .with_headers(headers)
        .with_form(form);
    let mut ctx = SiteContext::new(state.services.clone(), request, config);

    match state.dispatcher.run(&mut ctx).await {
        Ok(Outcome::Display) => render_display(&ctx),
        Ok(Outcome::Deliver) => delivery_response(&ctx),
        Err(err) if err.is_halt() => {
            warn!(
                target = "sitehook::http::site",
                host = ctx.host(),
                reason = %err,
                "Request halted by hook"
            );
            apology(None, "request halted", &err.to_string())
        }
        Err(err) => dispatch_failure(&ctx, err),
    }
}

fn dispatch_failure(ctx: &SiteContext, err: DispatchError) -> Response {
    HttpError::from_error(
        SOURCE,
        StatusCode::INTERNAL_SERVER_ERROR,
        err.to_string(),
        &err,
    )
    .with_preamble(&ctx.output.text())
    .into_response()
}

fn delivery_response(ctx: &SiteContext) -> Response {
    match deliver(ctx) {
        Ok(Delivery::Json(body)) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Ok(Delivery::Redirect(target)) => Redirect::to(&target).into_response(),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Result could not be encoded",
            &err,
        )
        .into_response(),
    }
}

fn apology(detail: Option<&str>, source_message: &str, diagnostic: &str) -> Response {
    let body = match detail {
        Some(detail) => format!("{APOLOGY}\n{detail}"),
        None => APOLOGY.to_string(),
    };
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
    ErrorReport {
        source: SOURCE,
        status: StatusCode::INTERNAL_SERVER_ERROR,
        messages: vec![source_message.to_string(), diagnostic.to_string()],
    }
    .attach(&mut response);
    response
}

/// The `Host` header as sent, falling back to the request target's authority.
fn request_host(parts: &Parts) -> String {
    parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Query parameters first, then an urlencoded body.
async fn read_form(parts: &Parts, body: Body, limit: usize) -> Result<FormInput, HttpError> {
    let mut form = parts
        .uri
        .query()
        .map(|query| FormInput::from_urlencoded(query.as_bytes()))
        .unwrap_or_default();

    let is_form = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));
    if is_form {
        let bytes = body::to_bytes(body, limit).await.map_err(|err| {
            HttpError::new(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body could not be read",
                err.to_string(),
            )
        })?;
        form.merge_urlencoded(&bytes);
    }
    Ok(form)
}
