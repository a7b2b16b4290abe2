use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::failure::MatcherKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub gate: GateConfig,
    pub escalation: EscalationConfig,
    pub retention: RetentionConfig,
    pub failure: FailureConfig,
    pub storage: StorageConfig,
    pub collaborators: CollaboratorsConfig,
    pub executor: ExecutorConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-pro-latest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Highest risk score that is auto-approved
    pub risk_threshold: f64,
    /// Maximum approved steps sent to the executor per loop
    pub max_steps: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 0.4,
            max_steps: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Invoke self-repair every `cadence` loops
    pub cadence: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self { cadence: 32 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub recent_ordinals: u64,
    pub max_artifact_files: usize,
    pub keep_artifact_files: usize,
    pub max_site_bytes: u64,
    pub max_page_age_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            recent_ordinals: 10,
            max_artifact_files: 1000,
            keep_artifact_files: 100,
            max_site_bytes: 100 * 1024 * 1024,
            max_page_age_secs: 86400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureConfig {
    pub matcher: MatcherKind,
    /// Recorded failures needed before a command is skipped
    pub min_recurrence: u32,
    pub summary_top_n: usize,
    /// Count at which a repeated-failure request is filed for self-repair
    pub repeat_request_at: u32,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherKind::Normalized,
            min_recurrence: 1,
            summary_top_n: 5,
            repeat_request_at: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub site_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            site_dir: PathBuf::from("site"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    pub plan: EndpointConfig,
    pub review: EndpointConfig,
    pub reflect: EndpointConfig,
    pub strategize: EndpointConfig,
    pub memory: EndpointConfig,
    pub self_repair: EndpointConfig,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            plan: EndpointConfig::new("http://127.0.0.1:10005/_py/plan", 120_000),
            review: EndpointConfig::new("http://127.0.0.1:10001/_py/review", 120_000),
            reflect: EndpointConfig::new("http://127.0.0.1:10002/_py/reflect", 120_000),
            strategize: EndpointConfig::new("http://127.0.0.1:10003/_py/strategize", 180_000),
            memory: EndpointConfig::new("http://127.0.0.1:10004/_py", 30_000),
            self_repair: EndpointConfig::new("http://127.0.0.1:10006/_py/improve", 300_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:10000", 120_000)
    }
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            url: url.into(),
            timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub program: PathBuf,
    /// Arguments placed before the steps JSON
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("./run_steps.sh"),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            timeout_ms: 600_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between timer-triggered loop requests, 0 disables the timer
    pub loop_interval_secs: u64,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir
                .join(project_name)
                .join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply environment-style overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_env(&lookup, "PORT") {
            self.server.port = port;
        }
        if let Some(model) = lookup("MODEL_GEMINI") {
            self.llm.model = model;
        }
        if let Some(threshold) = parse_env(&lookup, "AUTO_APPROVE_RISK_THRESHOLD") {
            self.gate.risk_threshold = threshold;
        }
        if let Some(max_steps) = parse_env(&lookup, "MAX_APPROVED_STEPS_PER_LOOP") {
            self.gate.max_steps = max_steps;
        }
        if let Some(dir) = lookup("KAIZEN_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("KAIZEN_SITE_DIR") {
            self.storage.site_dir = PathBuf::from(dir);
        }
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let threshold = self.gate.risk_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(crate::KaizenError::Config(format!(
                "gate.risk_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.gate.max_steps == 0 {
            return Err(crate::KaizenError::Config("gate.max_steps must be positive".into()));
        }
        if self.escalation.cadence == 0 {
            return Err(crate::KaizenError::Config("escalation.cadence must be positive".into()));
        }
        if self.retention.keep_artifact_files > self.retention.max_artifact_files {
            return Err(crate::KaizenError::Config(
                "retention.keep_artifact_files cannot exceed retention.max_artifact_files".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.gate.risk_threshold, 0.4);
        assert_eq!(config.gate.max_steps, 7);
        assert_eq!(config.escalation.cadence, 32);
        assert_eq!(config.retention.max_artifact_files, 1000);
        assert_eq!(config.retention.keep_artifact_files, 100);
        assert_eq!(config.executor.timeout_ms, 600_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("PORT", "8080"),
            ("MODEL_GEMINI", "gemini-2.0-flash"),
            ("AUTO_APPROVE_RISK_THRESHOLD", "0.25"),
            ("MAX_APPROVED_STEPS_PER_LOOP", "3"),
            ("KAIZEN_DATA_DIR", "/var/lib/kaizen"),
        ]));

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.gate.risk_threshold, 0.25);
        assert_eq!(config.gate.max_steps, 3);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/kaizen"));
    }

    #[test]
    fn test_unparsable_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[("PORT", "eighty"), ("MAX_APPROVED_STEPS_PER_LOOP", "-1")]));
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.gate.max_steps, 7);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.gate.risk_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_keep_above_ceiling() {
        let mut config = Config::default();
        config.retention.keep_artifact_files = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kaizen.yml");
        fs::write(
            &path,
            "gate:\n  risk_threshold: 0.2\nfailure:\n  matcher: coarse\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.gate.risk_threshold, 0.2);
        assert_eq!(config.gate.max_steps, 7);
        assert_eq!(config.failure.matcher, MatcherKind::Coarse);
        assert_eq!(config.escalation.cadence, 32);
    }
}
