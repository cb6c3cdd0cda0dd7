//! The `user` module: resolves the acting user from a bearer token or session cookie.

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    application::{
        context::SiteContext,
        hooks::{BuildUserHook, HookError, TestHook},
    },
    domain::user::User,
};

pub const MODULE_NAME: &str = "user";
pub const SESSION_COOKIE: &str = "session";

/// Hex encoded SHA-256 of a presented token, as stored in `users.token_hash`.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Token from `Authorization: Bearer ...`, falling back to the session cookie.
pub fn request_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| session_cookie(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[derive(Debug, Default)]
pub struct UserModule;

#[async_trait]
impl BuildUserHook for UserModule {
    async fn build_user(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        let Some(token) = request_token(&ctx.request.headers) else {
            ctx.user = User::anonymous();
            return Ok(());
        };

        let record = ctx
            .services
            .users
            .find_by_token_hash(&hash_token(&token))
            .await?;
        ctx.user = match record {
            Some(record) => User::new(record.id, record.level),
            None => {
                debug!(
                    target = "sitehook::modules::user",
                    host = ctx.host(),
                    "Unknown token, continuing anonymously"
                );
                User::anonymous()
            }
        };
        Ok(())
    }
}

#[async_trait]
impl TestHook for UserModule {
    async fn test(&self, ctx: &mut SiteContext) -> Result<(), HookError> {
        let configured = ctx.config.section(MODULE_NAME).is_some();
        ctx.set_result(json!({
            "module": MODULE_NAME,
            "options": configured,
            "user": ctx.user,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn hashes_tokens_as_lowercase_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session=cookie-token"));
        assert_eq!(request_token(&headers).as_deref(), Some("cookie-token"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        assert_eq!(request_token(&headers).as_deref(), Some("header-token"));
    }

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=s3cret; lang=en"),
        );
        assert_eq!(request_token(&headers).as_deref(), Some("s3cret"));
    }

    #[test]
    fn ignores_other_schemes_and_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(request_token(&headers), None);
    }
}
