use dispatchr::controller::EngineConfig;
use dispatchr::planner::PlannerConfig;
use dispatchr::test_run::TestRunConfig;
use dispatchr::worker::WorkerConfig;
use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub log_level: Option<String>,
    pub engine: EngineConfig,
    pub planner: PlannerConfig,
    pub worker: WorkerConfig,
    pub test_run: TestRunConfig,
    /// Signature registry file; the built-in registry is used when unset
    pub registry: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            engine: EngineConfig::default(),
            planner: PlannerConfig::default(),
            worker: WorkerConfig::default(),
            test_run: TestRunConfig::default(),
            registry: None,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
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
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid config")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_cycles == 0 {
            bail!("engine.max-cycles must be at least 1");
        }
        if self.engine.max_concurrency == 0 {
            bail!("engine.max-concurrency must be at least 1");
        }
        if !(0.0..1.0).contains(&self.engine.min_confidence) {
            bail!(
                "engine.min-confidence must be in [0, 1), got {}",
                self.engine.min_confidence
            );
        }
        if self.worker.timeout_ms == 0 {
            bail!("worker.timeout-ms must be greater than 0");
        }
        if self.test_run.timeout_ms == 0 {
            bail!("test-run.timeout-ms must be greater than 0");
        }
        if self.worker.command.trim().is_empty() {
            bail!("worker.command must not be empty");
        }
        if self.test_run.command.trim().is_empty() {
            bail!("test-run.command must not be empty");
        }
        Ok(())
    }
}
