/*
 *  config.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Local process settings: YAML file, CLI overrides and validation
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::geoscope::HostRect;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8081/api";
pub const DEFAULT_REFRESH_SECS: u64 = 60;
pub const MIN_REFRESH_SECS: u64 = 5;
pub const DEFAULT_TIMEOUT_MS: u64 = 4000;
pub const DEFAULT_MAP_WIDTH: u32 = 1280;
pub const DEFAULT_MAP_HEIGHT: u32 = 720;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Settings of this process. Every field is optional so the file and the
/// command line can be layered; accessors apply the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    pub api_base: Option<String>,
    pub log_level: Option<String>,
    pub refresh_interval_secs: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    /// host supports resize observation; false selects the window fallback
    pub resize_observer: Option<bool>,
    pub map: Option<MapBox>,
}

/// Host box the headless map lays out in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MapBox {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Settings {
    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.unwrap_or(DEFAULT_REFRESH_SECS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn resize_observer(&self) -> bool {
        self.resize_observer.unwrap_or(true)
    }

    pub fn host_rect(&self) -> HostRect {
        let map = self.map.clone().unwrap_or_default();
        HostRect::new(
            map.width.unwrap_or(DEFAULT_MAP_WIDTH) as f64,
            map.height.unwrap_or(DEFAULT_MAP_HEIGHT) as f64,
        )
    }
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the dashboard and map core until signalled
    Run,
    /// Print the remote configuration as JSON
    ConfigGet,
    /// Replace the remote configuration with a JSON file
    ConfigPut {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Report whether the backend answers
    Health,
    /// Print the composed map style document
    Style,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "pantalla", about = "Pantalla kiosk core", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// debug logging
    #[arg(short = 'v', long = "debug", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long, value_hint = ValueHint::Url)]
    pub api_base: Option<String>,
    #[arg(long)]
    pub refresh_interval_secs: Option<u64>,
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,
    #[arg(long)]
    pub map_width: Option<u32>,
    #[arg(long)]
    pub map_height: Option<u32>,
    #[arg(long, action = ArgAction::Set)]
    pub resize_observer: Option<bool>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

/// defaults, then the YAML file, then the command line, then validation.
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    let mut cfg = Settings::default();

    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    apply_cli_overrides(&mut cfg, cli);

    validate(&cfg)?;

    Ok(cfg)
}

/// Merged settings as YAML, for `--dump-config`.
pub fn dump(cfg: &Settings) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// First hit wins.
fn find_config_file() -> Option<PathBuf> {
    if let Some(home) = home_dir() {
        let p = home.join(".config/pantalla/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/pantalla.yaml");
        if p.exists() { return Some(p) }
    }
    for candidate in &["pantalla.yaml", "config.yaml", "config/pantalla.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Settings, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Settings = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

fn merge(dst: &mut Settings, src: Settings) {
    if src.api_base.is_some()              { dst.api_base = src.api_base; }
    if src.log_level.is_some()             { dst.log_level = src.log_level; }
    if src.refresh_interval_secs.is_some() { dst.refresh_interval_secs = src.refresh_interval_secs; }
    if src.request_timeout_ms.is_some()    { dst.request_timeout_ms = src.request_timeout_ms; }
    if src.resize_observer.is_some()       { dst.resize_observer = src.resize_observer; }
    match (&mut dst.map, src.map) {
        (None, Some(m)) => dst.map = Some(m),
        (Some(d), Some(s)) => merge_map(d, s),
        _ => {}
    }
}

fn merge_map(dst: &mut MapBox, src: MapBox) {
    if src.width.is_some()  { dst.width = src.width; }
    if src.height.is_some() { dst.height = src.height; }
}

fn apply_cli_overrides(cfg: &mut Settings, cli: &Cli) {
    if cli.api_base.is_some()              { cfg.api_base = cli.api_base.clone(); }
    if cli.log_level.is_some()             { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                           { cfg.log_level = Some("debug".into()); }
    if cli.refresh_interval_secs.is_some() { cfg.refresh_interval_secs = cli.refresh_interval_secs; }
    if cli.request_timeout_ms.is_some()    { cfg.request_timeout_ms = cli.request_timeout_ms; }
    if cli.resize_observer.is_some()       { cfg.resize_observer = cli.resize_observer; }

    if (cli.map_width.is_some() || cli.map_height.is_some()) && cfg.map.is_none() {
        cfg.map = Some(MapBox::default());
    }
    if let Some(map) = cfg.map.as_mut() {
        if cli.map_width.is_some()  { map.width = cli.map_width; }
        if cli.map_height.is_some() { map.height = cli.map_height; }
    }
}

/// Zero map dimensions are allowed; the map waits for a real size.
fn validate(cfg: &Settings) -> Result<(), ConfigError> {
    let base = cfg.api_base();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "api_base must start with http:// or https:// (got '{}')",
            base
        )));
    }
    if let Some(secs) = cfg.refresh_interval_secs {
        if secs < MIN_REFRESH_SECS {
            return Err(ConfigError::Validation(format!(
                "refresh_interval_secs must be >= {}",
                MIN_REFRESH_SECS
            )));
        }
    }
    if cfg.request_timeout_ms == Some(0) {
        return Err(ConfigError::Validation("request_timeout_ms must be > 0".into()));
    }
    if let Some(level) = cfg.log_level.as_deref() {
        match level {
            "error" | "warn" | "info" | "debug" | "trace" | "off" => {}
            other => {
                return Err(ConfigError::Validation(format!("unknown log_level '{}'", other)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["pantalla"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn temp_yaml(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pantalla-{}-{}.yaml", name, std::process::id()));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.api_base(), "http://127.0.0.1:8081/api");
        assert_eq!(s.refresh_interval(), Duration::from_secs(60));
        assert_eq!(s.request_timeout(), Duration::from_millis(4000));
        assert_eq!(s.host_rect(), HostRect::new(1280.0, 720.0));
        assert!(s.resize_observer());
        assert!(validate(&s).is_ok());
    }

    #[test]
    fn test_subcommands() {
        assert_eq!(cli(&[]).command(), Command::Run);
        assert_eq!(cli(&["health"]).command(), Command::Health);
        assert_eq!(cli(&["config-get"]).command(), Command::ConfigGet);
        assert_eq!(
            cli(&["config-put", "cfg.json"]).command(),
            Command::ConfigPut { file: PathBuf::from("cfg.json") }
        );
        assert!(cli(&["-v", "style"]).debug);
    }

    #[test]
    fn test_yaml_then_cli_overrides() {
        let path = temp_yaml(
            "layer",
            "api_base: https://kiosk.local/api\nrefresh_interval_secs: 30\nmap:\n  width: 800\n",
        );
        let c = cli(&[
            "--config",
            path.to_str().unwrap(),
            "--map-height",
            "0",
            "--resize-observer",
            "false",
        ]);
        let s = load(&c).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(s.api_base(), "https://kiosk.local/api");
        assert_eq!(s.refresh_interval(), Duration::from_secs(30));
        assert_eq!(s.host_rect(), HostRect::new(800.0, 0.0));
        assert!(!s.resize_observer());
    }

    #[test]
    fn test_dump_config_returns_merged_yaml() {
        let c = cli(&["--api-base", "https://kiosk.local/api", "--dump-config"]);
        assert!(c.dump_config);
        let s = load(&c).unwrap();
        let yaml = dump(&s).unwrap();
        assert!(yaml.contains("api_base: https://kiosk.local/api"));
        let back: Settings = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.api_base(), "https://kiosk.local/api");
    }

    #[test]
    fn test_missing_explicit_file() {
        let c = cli(&["--config", "/nonexistent/pantalla.yaml"]);
        assert!(matches!(load(&c), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation() {
        let mut s = Settings { api_base: Some("ftp://x".into()), ..Default::default() };
        assert!(validate(&s).is_err());
        s.api_base = None;
        s.refresh_interval_secs = Some(2);
        assert!(validate(&s).is_err());
        s.refresh_interval_secs = Some(5);
        s.log_level = Some("chatty".into());
        assert!(validate(&s).is_err());
    }

    #[test]
    fn test_debug_flag_wins() {
        let mut s = Settings { log_level: Some("warn".into()), ..Default::default() };
        apply_cli_overrides(&mut s, &cli(&["--debug"]));
        assert_eq!(s.log_level(), "debug");
    }
}
