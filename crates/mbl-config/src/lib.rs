//! mbl-config
//!
//! Layered YAML configuration: earlier documents are base, later documents
//! override via deep merge. The merged document is canonicalized and hashed
//! so the daemon can log exactly which configuration it booted with.
//!
//! Secrets never live in config files — config stores env var **names**
//! only (see [`secrets`]), and any leaf string that looks like a literal
//! secret aborts the load.

pub mod secrets;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Known secret-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts with
/// CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI style
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
];

// Telegram bot tokens look like "123456789:AAF...": a numeric id, a colon,
// then a 30+ char blob. Worth its own check since this product is built
// around exactly that credential.
fn looks_like_telegram_token(s: &str) -> bool {
    let Some((id, rest)) = s.split_once(':') else {
        return false;
    };
    id.len() >= 6 && id.chars().all(|c| c.is_ascii_digit()) && rest.len() >= 30
}

// ---------------------------------------------------------------------------
// Loading + hashing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub config_json: Value,
}

/// Load and merge YAML files in order. Missing *override* layers (every
/// path after the first) are skipped silently; the base layer is required.
pub fn load_layered_yaml(paths: &[&Path]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for (i, p) in paths.iter().enumerate() {
        if i > 0 && !p.exists() {
            continue;
        }
        let raw = fs::read_to_string(p).with_context(|| format!("read config file {p:?}"))?;
        docs.push(raw);
    }
    let refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical =
        serde_json::to_string(&sort_keys(&merged)).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p)) || looks_like_telegram_token(t)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let token = k.replace('~', "~0").replace('/', "~1");
                collect_leaf_pointers(vv, &format!("{prefix}/{token}"), out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ => out.push(if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }),
    }
}

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

/// The typed view of the merged document the daemon actually reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Scheduler wake interval. The 1-minute user-facing granularity
    /// requires this to be at most 60.
    pub poll_interval_secs: u64,
    /// Per-quote-fetch and per-send timeout inside one cycle.
    pub call_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            call_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DigestConfig {
    /// Local hour (0-23) after which the daily digest goes out.
    pub hour: u32,
    /// IANA timezone name, e.g. "Europe/Istanbul".
    pub timezone: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            hour: 8,
            timezone: "Europe/Istanbul".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "state/marketbell.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Env var NAME holding the bot token. Never the token itself.
    pub token_env: String,
    pub api_base: String,
    /// getUpdates long-poll timeout.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: "MARKETBELL_TELEGRAM_TOKEN".to_string(),
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketDataConfig {
    pub base_url: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
        }
    }
}

impl AppConfig {
    /// Typed extraction with sanity checks on the values other crates
    /// assume (positive intervals, valid digest hour).
    pub fn from_value(config_json: &Value) -> Result<Self> {
        let cfg: AppConfig =
            serde_json::from_value(config_json.clone()).context("config shape invalid")?;
        if cfg.engine.poll_interval_secs == 0 || cfg.engine.poll_interval_secs > 60 {
            bail!(
                "engine.poll_interval_secs must be in 1..=60, got {}",
                cfg.engine.poll_interval_secs
            );
        }
        if cfg.digest.hour > 23 {
            bail!("digest.hour must be 0..=23, got {}", cfg.digest.hour);
        }
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layers_override_earlier() {
        let base = "engine:\n  poll_interval_secs: 30\n  call_timeout_secs: 10\n";
        let local = "engine:\n  poll_interval_secs: 5\n";
        let loaded = load_layered_yaml_from_strings(&[base, local]).unwrap();
        let cfg = AppConfig::from_value(&loaded.config_json).unwrap();
        assert_eq!(cfg.engine.poll_interval_secs, 5);
        assert_eq!(cfg.engine.call_timeout_secs, 10);
    }

    #[test]
    fn hash_is_stable_across_key_order() {
        let a = load_layered_yaml_from_strings(&["digest:\n  hour: 8\n  timezone: UTC\n"]).unwrap();
        let b = load_layered_yaml_from_strings(&["digest:\n  timezone: UTC\n  hour: 8\n"]).unwrap();
        assert_eq!(a.config_hash, b.config_hash);
    }

    #[test]
    fn empty_config_yields_defaults() {
        let loaded = load_layered_yaml_from_strings(&["{}"]).unwrap();
        let cfg = AppConfig::from_value(&loaded.config_json).unwrap();
        assert_eq!(cfg.digest.hour, 8);
        assert_eq!(cfg.digest.timezone, "Europe/Istanbul");
        assert_eq!(cfg.telegram.token_env, "MARKETBELL_TELEGRAM_TOKEN");
    }

    #[test]
    fn out_of_range_poll_interval_is_rejected() {
        let loaded = load_layered_yaml_from_strings(&[
            "engine:\n  poll_interval_secs: 300\n  call_timeout_secs: 10\n",
        ])
        .unwrap();
        assert!(AppConfig::from_value(&loaded.config_json).is_err());
    }

    #[test]
    fn literal_telegram_token_aborts_load() {
        let yaml = "telegram:\n  token_env: \"123456789:AAFkeMbTelegramTokenLookalikeValue00\"\n";
        let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("CONFIG_SECRET_DETECTED"), "got: {msg}");
        assert!(!msg.contains("AAFkeMb"), "value must be redacted: {msg}");
    }

    #[test]
    fn known_secret_prefix_aborts_load() {
        let yaml = "market_data:\n  base_url: \"sk-live-abcdefgh\"\n";
        assert!(load_layered_yaml_from_strings(&[yaml]).is_err());
    }
}
