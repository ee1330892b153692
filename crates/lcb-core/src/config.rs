use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{ChannelId, ServerId},
    errors::Error,
    fetch::{FetchLimits, DEFAULT_BYTE_CAP, DEFAULT_MAX_REDIRECTS},
    Result,
};

/// Largest accepted `LCB_BYTE_CAP`; titles live in the document head.
pub const MAX_BYTE_CAP: usize = 1 << 20;

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Chat identity
    pub server: ServerId,
    pub channel: ChannelId,

    // Title fetching
    pub max_redirects: u32,
    pub byte_cap: usize,
    pub fetch_timeout: Duration,
    pub user_agent: String,

    // Registry
    pub registry_file: Option<PathBuf>,

    // Notifications
    pub notify_interval: Duration,
    pub message_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in `load`).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let str_or = |key: &str, default: &str| {
            get(key)
                .and_then(non_empty)
                .unwrap_or_else(|| default.to_string())
        };
        let u64_of = |key: &str| -> Result<Option<u64>> {
            match get(key).and_then(non_empty) {
                None => Ok(None),
                Some(v) => v.trim().parse::<u64>().map(Some).map_err(|_| {
                    Error::Config(format!("{key} must be a non-negative integer, got {v:?}"))
                }),
            }
        };

        let server = str_or("LCB_SERVER", "localhost").trim().to_string();
        let channel = str_or("LCB_CHANNEL", "#links").trim().to_string();

        let max_redirects = u64_of("LCB_MAX_REDIRECTS")?
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(DEFAULT_MAX_REDIRECTS);

        let byte_cap = u64_of("LCB_BYTE_CAP")?
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_BYTE_CAP);
        if byte_cap == 0 || byte_cap > MAX_BYTE_CAP {
            return Err(Error::Config(format!(
                "LCB_BYTE_CAP must be between 1 and {MAX_BYTE_CAP}"
            )));
        }

        let fetch_timeout =
            Duration::from_millis(u64_of("LCB_FETCH_TIMEOUT_MS")?.unwrap_or(10_000));
        if fetch_timeout.is_zero() {
            return Err(Error::Config(
                "LCB_FETCH_TIMEOUT_MS must be at least 1".to_string(),
            ));
        }

        let user_agent = str_or("LCB_USER_AGENT", "lcb/0.1");
        let registry_file = get("LCB_REGISTRY_FILE")
            .and_then(non_empty)
            .map(PathBuf::from);

        let notify_interval = Duration::from_millis(u64_of("LCB_NOTIFY_INTERVAL_MS")?.unwrap_or(0));
        let message_limit = u64_of("LCB_MESSAGE_LIMIT")?
            .map(|v| v as usize)
            .unwrap_or(400)
            .max(16);

        Ok(Self {
            server: ServerId(server),
            channel: ChannelId(channel),
            max_redirects,
            byte_cap,
            fetch_timeout,
            user_agent,
            registry_file,
            notify_interval,
            message_limit,
        })
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            max_redirects: self.max_redirects,
            byte_cap: self.byte_cap,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
