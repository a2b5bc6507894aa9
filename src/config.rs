use crate::ir::{Direction, Point, Size};
use crate::theme::DEFAULT_NODE_POSITION;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const API_URL_ENV: &str = "AMLS_API_URL";
pub const DEBOUNCE_MS_ENV: &str = "AMLS_DEBOUNCE_MS";

pub const MIN_PACKAGE_SIZE: Size = Size::new(200.0, 150.0);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub direction: Direction,
    /// Nominal class box size handed to the layout engine.
    pub node_width: f32,
    pub node_height: f32,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub margin_x: f32,
    pub margin_y: f32,
    /// Floor for package sizes, both when resized by hand and when fitted by layout.
    pub package_min_size: Size,
    pub default_node_position: Point,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: Direction::TopDown,
            node_width: 420.0,
            node_height: 500.0,
            node_spacing: 140.0,
            rank_spacing: 200.0,
            margin_x: 100.0,
            margin_y: 100.0,
            package_min_size: MIN_PACKAGE_SIZE,
            default_node_position: DEFAULT_NODE_POSITION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub debounce_ms: u64,
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            api_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    direction: Option<String>,
    node_width: Option<f32>,
    node_height: Option<f32>,
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    margin_x: Option<f32>,
    margin_y: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncConfigFile {
    debounce_ms: Option<u64>,
    api_url: Option<String>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    sync: Option<SyncConfigFile>,
}

/// Parse an environment variable, falling back to `default` when unset or malformed.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Loads defaults, overlays the optional JSON5 file, then applies environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            parse_config(&contents)?
        }
        None => Config::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = json5::from_str(contents)?;
    let mut config = Config::default();

    if let Some(layout) = parsed.layout {
        if let Some(token) = layout.direction.as_deref() {
            config.layout.direction = Direction::from_token(token)
                .ok_or_else(|| anyhow::anyhow!("unknown layout direction `{token}`"))?;
        }
        if let Some(v) = layout.node_width {
            config.layout.node_width = v;
        }
        if let Some(v) = layout.node_height {
            config.layout.node_height = v;
        }
        if let Some(v) = layout.node_spacing {
            config.layout.node_spacing = v;
        }
        if let Some(v) = layout.rank_spacing {
            config.layout.rank_spacing = v;
        }
        if let Some(v) = layout.margin_x {
            config.layout.margin_x = v;
        }
        if let Some(v) = layout.margin_y {
            config.layout.margin_y = v;
        }
    }

    if let Some(sync) = parsed.sync {
        if let Some(v) = sync.debounce_ms {
            config.sync.debounce_ms = v;
        }
        if let Some(v) = sync.api_url {
            config.sync.api_url = v;
        }
        if let Some(v) = sync.request_timeout_secs {
            config.sync.request_timeout_secs = v;
        }
        if let Some(v) = sync.connect_timeout_secs {
            config.sync.connect_timeout_secs = v;
        }
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            config.sync.api_url = url;
        }
    }
    config.sync.debounce_ms = env_parse(DEBOUNCE_MS_ENV, config.sync.debounce_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.layout.node_spacing, 140.0);
        assert_eq!(config.layout.rank_spacing, 200.0);
        assert_eq!(config.layout.package_min_size, Size::new(200.0, 150.0));
        assert_eq!(config.sync.debounce(), Duration::from_millis(500));
        assert_eq!(config.sync.api_url, "http://localhost:8000");
    }

    #[test]
    fn json5_overlay_keeps_unset_fields() {
        let config = parse_config(
            "{\n  // comments allowed\n  layout: { direction: 'LR', nodeSpacing: 60 },\n  sync: { debounceMs: 250, },\n}",
        )
        .unwrap();
        assert_eq!(config.layout.direction, Direction::LeftRight);
        assert_eq!(config.layout.node_spacing, 60.0);
        assert_eq!(config.layout.rank_spacing, 200.0);
        assert_eq!(config.sync.debounce_ms, 250);
        assert_eq!(config.sync.request_timeout_secs, 30);
    }

    #[test]
    fn unknown_direction_is_rejected() {
        assert!(parse_config("{ layout: { direction: 'XY' } }").is_err());
    }

    #[test]
    fn env_parse_falls_back_on_missing_or_invalid() {
        let val: u64 = env_parse("__AMLS_TEST_MISSING_KEY__", 42);
        assert_eq!(val, 42);
        unsafe { std::env::set_var("__AMLS_TEST_INVALID__", "soon") };
        let val: u64 = env_parse("__AMLS_TEST_INVALID__", 7);
        assert_eq!(val, 7);
        unsafe { std::env::remove_var("__AMLS_TEST_INVALID__") };
    }
}
