use std::{env, net::SocketAddr, time::Duration};

use crate::{backend::BackendDescriptor, errors::ConfigError, wire::PromptFormat};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:11111";
const DEFAULT_BACKENDS: &str =
    "http://127.0.0.1:10000=raw,http://127.0.0.1:10001=raw,http://127.0.0.1:10002=raw";
const DEFAULT_END_MARKERS: &str = "</s>,<|endoftext|>,<|im_end|>";

/// Process configuration, read once at startup. Invalid values are startup
/// errors, never request-time errors.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    pub backends: Vec<BackendDescriptor>,
    /// Cap applied when the client asks for unbounded generation.
    pub default_predict: u32,
    /// Chunk granularity: each round requests base + jitter(0..=base) tokens.
    pub chunk_base: u32,
    /// Trailing markers that read as a genuine end of generation.
    pub end_markers: Vec<String>,
    /// Applies to both chunk rounds and the passthrough.
    pub upstream_timeout: Duration,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_raw =
            env::var("PROXY_LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_owned());
        let listen_addr = listen_raw
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(listen_raw))?;

        let backends_raw =
            env::var("PROXY_BACKENDS").unwrap_or_else(|_| DEFAULT_BACKENDS.to_owned());
        let backends = parse_backend_list(&backends_raw)?;

        let markers_raw =
            env::var("PROXY_END_TOKENS").unwrap_or_else(|_| DEFAULT_END_MARKERS.to_owned());

        Ok(Self {
            listen_addr,
            backends,
            default_predict: read_u32("PROXY_DEFAULT_N_PREDICT", 100).max(1),
            chunk_base: read_u32("PROXY_CHUNK_SIZE", 15).max(1),
            end_markers: parse_marker_list(&markers_raw),
            upstream_timeout: Duration::from_secs(read_u64("PROXY_UPSTREAM_TIMEOUT_SECS", 300)),
        })
    }
}

/// Parses `url[=format],url[=format],...`; the format defaults to `raw`.
pub fn parse_backend_list(raw: &str) -> Result<Vec<BackendDescriptor>, ConfigError> {
    let mut backends = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (address, format) = match entry.split_once('=') {
            Some((address, format)) => (address.trim(), PromptFormat::parse(format.trim())?),
            None => (entry, PromptFormat::ChatMl),
        };
        if address.is_empty() {
            return Err(ConfigError::InvalidBackend(entry.to_owned()));
        }
        backends.push(BackendDescriptor::new(address, format));
    }

    if backends.is_empty() {
        return Err(ConfigError::NoBackends);
    }
    Ok(backends)
}

fn parse_marker_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|marker| !marker.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn read_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}
