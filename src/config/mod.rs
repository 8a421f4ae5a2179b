use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::form::{MealFlags, Transportation, TripForm};
use crate::timeline::{ClockTime, DEFAULT_MIN_GAP_MINUTES, MINUTES_PER_DAY};
use crate::trip::Intensity;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Tripline";
const APP_NAME: &str = "tripline";

pub const CONFIG_ENV: &str = "TRIPLINE_CONFIG";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let cache_dir = project_dirs.cache_dir().to_path_buf();
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_local_dir().join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            cache_dir,
            log_dir,
            state_dir,
        })
    }

    /// Lays every directory out under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            config_file: root.join("config/config.toml"),
            cache_dir: root.join("cache"),
            log_dir: root.join("state/logs"),
            state_dir: root.join("state"),
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.cache_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendOptions,
    pub planner: PlannerDefaults,
    pub timeline: TimelineOptions,
}

impl AppConfig {
    fn post_load(&mut self) {
        self.backend.validate();
        self.planner.validate();
        self.timeline.validate();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Cards requested per `/recommend/more` page.
    pub more_page_size: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 60,
            more_page_size: 6,
        }
    }
}

impl BackendOptions {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&mut self) {
        let fallback = Self::default();
        if self.base_url.trim().is_empty() {
            tracing::warn!("empty backend.base_url in config, using {}", fallback.base_url);
            self.base_url = fallback.base_url;
        }
        if self.request_timeout_secs == 0 {
            tracing::warn!("backend.request_timeout_secs must be positive, using {}", fallback.request_timeout_secs);
            self.request_timeout_secs = fallback.request_timeout_secs;
        }
        if self.more_page_size == 0 {
            tracing::warn!("backend.more_page_size must be positive, using {}", fallback.more_page_size);
            self.more_page_size = fallback.more_page_size;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MealDefaults {
    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,
}

impl Default for MealDefaults {
    fn default() -> Self {
        Self {
            breakfast: true,
            lunch: true,
            dinner: true,
        }
    }
}

impl From<&MealDefaults> for MealFlags {
    fn from(meals: &MealDefaults) -> Self {
        let mut flags = MealFlags::empty();
        flags.set(MealFlags::BREAKFAST, meals.breakfast);
        flags.set(MealFlags::LUNCH, meals.lunch);
        flags.set(MealFlags::DINNER, meals.dinner);
        flags
    }
}

/// Values pre-filled into a new trip form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerDefaults {
    pub intensity: Intensity,
    pub transportation: Transportation,
    pub wake_up_time: String,
    pub return_time: String,
    pub meals: MealDefaults,
}

impl Default for PlannerDefaults {
    fn default() -> Self {
        Self {
            intensity: Intensity::Normal,
            transportation: Transportation::Public,
            wake_up_time: "08:00".to_string(),
            return_time: "21:00".to_string(),
            meals: MealDefaults::default(),
        }
    }
}

impl PlannerDefaults {
    pub fn form(&self) -> TripForm {
        TripForm {
            intensity: self.intensity,
            transportation: self.transportation,
            wake_up_time: Some(self.wake_up_time.clone()),
            return_time: Some(self.return_time.clone()),
            meals: MealFlags::from(&self.meals),
            ..TripForm::default()
        }
    }

    fn validate(&mut self) {
        let fallback = Self::default();
        let wake = ClockTime::parse(&self.wake_up_time);
        let back = ClockTime::parse(&self.return_time);
        if wake.is_none() {
            tracing::warn!(value = %self.wake_up_time, "invalid planner.wake_up_time in config, falling back to {}", fallback.wake_up_time);
            self.wake_up_time = fallback.wake_up_time.clone();
        }
        if back.is_none() {
            tracing::warn!(value = %self.return_time, "invalid planner.return_time in config, falling back to {}", fallback.return_time);
            self.return_time = fallback.return_time.clone();
        }
        if let (Some(wake), Some(back)) = (wake, back) {
            if back <= wake {
                tracing::warn!(%wake, %back, "planner.return_time is not after wake_up_time, using defaults");
                self.wake_up_time = fallback.wake_up_time;
                self.return_time = fallback.return_time;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineOptions {
    /// Shortest idle stretch, in minutes, reported as free time.
    pub min_gap_minutes: u16,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            min_gap_minutes: DEFAULT_MIN_GAP_MINUTES,
        }
    }
}

impl TimelineOptions {
    fn validate(&mut self) {
        if self.min_gap_minutes == 0 || self.min_gap_minutes >= MINUTES_PER_DAY {
            tracing::warn!(
                value = self.min_gap_minutes,
                "timeline.min_gap_minutes out of range, falling back to {DEFAULT_MIN_GAP_MINUTES}"
            );
            self.min_gap_minutes = DEFAULT_MIN_GAP_MINUTES;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_default_config() -> Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted_at(temp.path()));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.backend.more_page_size, 6);

        let written = fs::read_to_string(&loader.paths().config_file)?;
        assert!(written.contains("[backend]"));
        assert!(written.contains("min_gap_minutes = 30"));
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_keys() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[backend]\nbase_url = \"https://plans.example.com\"\n\n[planner]\nintensity = \"intense\"\ntransportation = \"car\"\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.backend.base_url, "https://plans.example.com");
        assert_eq!(cfg.backend.request_timeout_secs, 60);
        assert_eq!(cfg.planner.intensity, Intensity::Intense);
        assert_eq!(cfg.planner.transportation, Transportation::Car);
        assert_eq!(cfg.timeline.min_gap_minutes, 30);
        Ok(())
    }

    #[test]
    fn invalid_values_fall_back_after_load() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[backend]\nrequest_timeout_secs = 0\n\n[planner]\nwake_up_time = \"25:00\"\n\n[timeline]\nmin_gap_minutes = 0\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.backend.request_timeout_secs, 60);
        assert_eq!(cfg.planner.wake_up_time, "08:00");
        assert_eq!(cfg.timeline.min_gap_minutes, DEFAULT_MIN_GAP_MINUTES);
        Ok(())
    }

    #[test]
    fn planner_defaults_prefill_the_form() {
        let mut planner = PlannerDefaults::default();
        planner.meals.breakfast = false;
        let form = planner.form();
        assert_eq!(form.meals, MealFlags::LUNCH | MealFlags::DINNER);
        assert_eq!(form.wake_up_time.as_deref(), Some("08:00"));
        assert!(form.from.is_empty());
    }
}
