//! Per-sync configuration, stored in `.calmirror/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CalMirrorError, CalMirrorResult};
use crate::filter::FilterRule;
use crate::time_window::TimeWindow;

/// Default forward-looking horizon for source occurrences.
pub const DEFAULT_HORIZON_DAYS: i64 = 30;

/// Default delay between watch-mode sync cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Configuration of one source → target sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Sync name; doubles as the marker owner tag and the mapping scope
    pub name: String,
    /// Source calendar directory
    pub source: PathBuf,
    /// Target calendar directory
    pub target: PathBuf,
    /// Identifier the target calendar must carry for deletions to be allowed
    pub target_calendar_id: String,
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,
    /// IANA timezone used for time-window evaluation
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub filters: Vec<FilterRule>,
    #[serde(default)]
    pub windows: Vec<TimeWindow>,
    /// Delay between watch cycles, humantime form (e.g. "5m", "90s")
    #[serde(default)]
    pub interval: Option<String>,
}

/// What a mirrored event looks like in the target calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncMode {
    /// Copy title, times and location from the source
    #[default]
    Full,
    /// Opaque placeholder events; only the template title and times carry over
    Blocker {
        #[serde(default = "default_blocker_template")]
        title_template: String,
    },
}

impl SyncMode {
    /// Title the target twin should carry for a given source title.
    ///
    /// Blocker templates substitute the `{sourceTitle}` token.
    pub fn render_title(&self, source_title: &str) -> String {
        match self {
            SyncMode::Full => source_title.to_string(),
            SyncMode::Blocker { title_template } => {
                title_template.replace("{sourceTitle}", source_title)
            }
        }
    }
}

fn default_blocker_template() -> String {
    "Busy".to_string()
}

fn default_horizon_days() -> i64 {
    DEFAULT_HORIZON_DAYS
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl SyncConfig {
    /// Load config from `<dir>/.calmirror/config.toml`.
    pub fn load(dir: &Path) -> CalMirrorResult<Self> {
        let path = dir.join(".calmirror/config.toml");

        if !path.exists() {
            return Err(CalMirrorError::Config(format!(
                "No sync configured here. Expected {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        let config: SyncConfig =
            toml::from_str(&content).map_err(|e| CalMirrorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to `<dir>/.calmirror/config.toml`.
    pub fn save(&self, dir: &Path) -> CalMirrorResult<()> {
        let config_dir = dir.join(".calmirror");
        std::fs::create_dir_all(&config_dir)?;

        let content =
            toml::to_string_pretty(self).map_err(|e| CalMirrorError::Config(e.to_string()))?;
        std::fs::write(config_dir.join("config.toml"), content)?;
        Ok(())
    }

    fn validate(&self) -> CalMirrorResult<()> {
        if self.name.trim().is_empty() {
            return Err(CalMirrorError::Config("sync name must not be empty".into()));
        }
        if self.horizon_days <= 0 {
            return Err(CalMirrorError::Config(format!(
                "horizon_days must be positive, got {}",
                self.horizon_days
            )));
        }
        self.tz()?;
        self.interval()?;
        Ok(())
    }

    /// Parsed timezone for window evaluation.
    pub fn tz(&self) -> CalMirrorResult<Tz> {
        self.timezone
            .parse()
            .map_err(|_| CalMirrorError::Config(format!("Unknown timezone '{}'", self.timezone)))
    }

    /// Parsed watch interval, defaulting when unset.
    pub fn interval(&self) -> CalMirrorResult<Duration> {
        match self.interval {
            None => Ok(DEFAULT_INTERVAL),
            Some(ref s) => humantime::parse_duration(s)
                .map_err(|e| CalMirrorError::Config(format!("Invalid interval '{s}': {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterKind;
    use chrono::Weekday;

    fn config() -> SyncConfig {
        SyncConfig {
            name: "work-mirror".to_string(),
            source: PathBuf::from("/calendars/work"),
            target: PathBuf::from("/calendars/personal"),
            target_calendar_id: "personal".to_string(),
            mode: SyncMode::Blocker {
                title_template: "Busy ({sourceTitle})".to_string(),
            },
            horizon_days: 14,
            timezone: "Europe/Stockholm".to_string(),
            filters: vec![FilterRule {
                kind: FilterKind::ExcludeAllDay,
                pattern: String::new(),
                case_sensitive: false,
                regex: false,
            }],
            windows: vec![TimeWindow {
                weekday: Weekday::Mon,
                start: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            }],
            interval: Some("90s".to_string()),
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        config.save(dir.path()).unwrap();

        let loaded = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.name, "work-mirror");
        assert_eq!(loaded.mode, config.mode);
        assert_eq!(loaded.windows, config.windows);
        assert_eq!(loaded.interval().unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SyncConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.timezone = "Mars/Olympus".to_string();
        config.save(dir.path()).unwrap();
        assert!(SyncConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_blocker_title_template() {
        let mode = SyncMode::Blocker {
            title_template: "Busy ({sourceTitle})".to_string(),
        };
        assert_eq!(mode.render_title("Standup"), "Busy (Standup)");
        assert_eq!(SyncMode::Full.render_title("Standup"), "Standup");
    }
}
