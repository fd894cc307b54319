//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only env var **names** (`telegram.token_env`).
//! - The daemon calls [`resolve_secrets`] once at startup and passes the
//!   result into constructors; no `std::env::var` calls anywhere else.
//! - The bot token is required — a missing or empty env var fails closed
//!   with SECRETS_MISSING, naming the var (never a value).
//! - `Debug` output is redacted.

use anyhow::{bail, Result};

use crate::AppConfig;

/// All runtime-resolved secrets. Built once at startup.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub telegram_token: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("telegram_token", &"<REDACTED>")
            .finish()
    }
}

/// Resolve every secret the daemon needs from the environment.
pub fn resolve_secrets(cfg: &AppConfig) -> Result<ResolvedSecrets> {
    let var = &cfg.telegram.token_env;
    let token = match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => bail!(
            "SECRETS_MISSING: env var {var} is not set or empty; \
            the Telegram bot token is required to start"
        ),
    };
    Ok(ResolvedSecrets {
        telegram_token: token,
    })
}
