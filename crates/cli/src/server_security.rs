use anyhow::{Context as AnyhowContext, Result};
use std::net::SocketAddr;

pub(crate) const AUTH_TOKEN_ENV: &str = "NAVIGATOR_AUTH_TOKEN";

const BEARER_PREFIX: &str = "Bearer ";

/// Shared secret expected in `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub(crate) struct AuthToken {
    token: String,
}

impl AuthToken {
    /// Flag value wins over the environment; blank tokens are rejected.
    pub(crate) fn from_flag_or_env(flag: Option<&str>) -> Result<Option<Self>> {
        let raw = flag
            .map(str::to_string)
            .or_else(|| std::env::var(AUTH_TOKEN_ENV).ok());
        Self::parse(raw.as_deref())
    }

    pub(crate) fn parse(raw: Option<&str>) -> Result<Option<Self>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let token = raw.trim();
        if token.is_empty() {
            anyhow::bail!("auth token must be non-empty")
        }
        Ok(Some(Self {
            token: token.to_string(),
        }))
    }

    pub(crate) fn accepts(&self, authorization: &str) -> bool {
        authorization
            .trim()
            .strip_prefix(BEARER_PREFIX)
            .is_some_and(|presented| constant_time_eq(presented.trim(), &self.token))
    }
}

/// Resolves `bind` and refuses anything but loopback unless `public` is set.
pub(crate) async fn guarded_bind_addrs(bind: &str, public: bool) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(bind)
        .await
        .with_context(|| format!("Failed to resolve bind address: {bind}"))?
        .collect();
    if addrs.is_empty() {
        anyhow::bail!("Bind address resolved to zero socket addrs: {bind}")
    }
    check_loopback(bind, &addrs, public)?;
    Ok(addrs)
}

fn check_loopback(bind: &str, addrs: &[SocketAddr], public: bool) -> Result<()> {
    if !public && addrs.iter().any(|addr| !addr.ip().is_loopback()) {
        anyhow::bail!(
            "Refusing to bind to non-loopback address without --public: {bind}. \
             To expose the navigator, pass --public and set {AUTH_TOKEN_ENV} (or --auth-token)."
        )
    }
    Ok(())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
