use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::allocator::{CreditScope, FairnessPolicy};
use crate::completion::DEFAULT_KEYWORD;
use crate::cycle::{DEFAULT_WINDOW_CYCLES, MAX_WINDOW_CYCLES, WindowPolicy};
use crate::error::{Result, RotaError};
use crate::model::{Chore, Person};
use crate::reminder::DEFAULT_LOOKAHEAD_MINUTES;
use crate::session::DEFAULT_SESSION_TTL_MINUTES;

/// Directory under the household root holding config, ledger and lock.
pub const ROTA_DIR: &str = ".rota";

/// Starter config written by `rota init`.
pub const SAMPLE_CONFIG: &str = r#"# Household roster. `id` is what people type; `name` is shown in messages.
[[people]]
id = "ana"
name = "Ana"

[[people]]
id = "bo"
name = "Bo"

# Weekly chores. Omit `recurrence` (or set manual_only) for on-request chores.
[[chores]]
title = "Take out trash"
recurrence = { weekday = "sunday", hour = 18 }
category = "trash"

[[chores]]
title = "Clean bathroom"
recurrence = { weekday = "saturday", hour = 11 }

[[chores]]
title = "Deep clean kitchen"
recurrence = { weekday = "saturday", hour = 15 }
headcount = 2

[[chores]]
title = "Descale kettle"
category = "kettle"

[fairness]
window = "rolling"   # or "month"
cycles = 8
credit_scope = "per_chore"   # or "total"

[completion]
keyword = "done"

[reminders]
lookahead_minutes = 30

[sessions]
ttl_minutes = 10

[clock]
utc_offset_minutes = 0
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdConfig {
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub chores: Vec<Chore>,
    #[serde(default)]
    pub fairness: FairnessConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    /// Preferred output mode (`pretty`, `text` or `json`).
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    #[default]
    Rolling,
    #[serde(alias = "calendar_month")]
    Month,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessConfig {
    #[serde(default)]
    pub window: WindowKind,
    #[serde(default = "default_cycles")]
    pub cycles: u32,
    #[serde(default)]
    pub credit_scope: CreditScope,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            window: WindowKind::default(),
            cycles: default_cycles(),
            credit_scope: CreditScope::default(),
        }
    }
}

impl FairnessConfig {
    #[must_use]
    pub const fn policy(&self) -> FairnessPolicy {
        let window = match self.window {
            WindowKind::Rolling => WindowPolicy::Rolling {
                cycles: self.cycles,
            },
            WindowKind::Month => WindowPolicy::CalendarMonth,
        };
        FairnessPolicy::new(window, self.credit_scope)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_keyword")]
    pub keyword: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            keyword: default_keyword(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_lookahead_minutes")]
    pub lookahead_minutes: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lookahead_minutes: default_lookahead_minutes(),
        }
    }
}

impl ReminderConfig {
    #[must_use]
    pub fn lookahead(&self) -> Duration {
        Duration::minutes(self.lookahead_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Household timezone as a fixed offset from UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl HouseholdConfig {
    /// Household timezone.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Configuration`] if the offset is out of range.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.clock
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                RotaError::Configuration(format!(
                    "clock.utc_offset_minutes {} is out of range",
                    self.clock.utc_offset_minutes
                ))
            })
    }

    /// Refuse configurations the household cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Configuration`] naming the first problem.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(RotaError::Configuration(msg));

        if self.people.is_empty() {
            return bad("no [[people]] configured".into());
        }
        let mut ids = BTreeSet::new();
        for person in &self.people {
            if person.id.as_str().trim().is_empty() {
                return bad("a person has an empty id".into());
            }
            if !ids.insert(&person.id) {
                return bad(format!("person '{}' is listed twice", person.id));
            }
        }

        if self.chores.is_empty() {
            return bad("no [[chores]] configured".into());
        }
        let mut titles = BTreeSet::new();
        for chore in &self.chores {
            if chore.title.trim().is_empty() {
                return bad("a chore has an empty title".into());
            }
            if !titles.insert(chore.title.to_lowercase()) {
                return bad(format!("chore '{}' is listed twice", chore.title));
            }
            if chore.recurrence.as_ref().is_some_and(|r| !r.is_valid()) {
                return bad(format!("chore '{}' has an invalid time of day", chore.title));
            }
            if chore.headcount == 0 {
                return bad(format!("chore '{}' has headcount 0", chore.title));
            }
        }

        if self.fairness.window == WindowKind::Rolling && self.fairness.cycles == 0 {
            return bad("fairness.cycles must be at least 1".into());
        }
        if self.fairness.window == WindowKind::Rolling && self.fairness.cycles > MAX_WINDOW_CYCLES {
            return bad(format!(
                "fairness.cycles is {}, the most allowed is {MAX_WINDOW_CYCLES}",
                self.fairness.cycles
            ));
        }
        if self.completion.keyword.trim().is_empty() {
            return bad("completion.keyword is empty".into());
        }
        if self.reminders.lookahead_minutes <= 0 {
            return bad("reminders.lookahead_minutes must be positive".into());
        }
        if self.sessions.ttl_minutes <= 0 {
            return bad("sessions.ttl_minutes must be positive".into());
        }
        self.utc_offset()?;
        Ok(())
    }

    /// Look up a roster member.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::UnknownPerson`] if `id` is not on the roster.
    pub fn person(&self, id: &crate::model::PersonId) -> Result<&Person> {
        self.people
            .iter()
            .find(|person| &person.id == id)
            .ok_or_else(|| RotaError::UnknownPerson(id.clone()))
    }
}

#[must_use]
pub fn rota_dir(root: &Path) -> PathBuf {
    root.join(ROTA_DIR)
}

#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    rota_dir(root).join("config.toml")
}

#[must_use]
pub fn ledger_path(root: &Path) -> PathBuf {
    rota_dir(root).join("rota.sqlite3")
}

#[must_use]
pub fn lock_path(root: &Path) -> PathBuf {
    rota_dir(root).join("ledger.lock")
}

/// Parse and validate a config document.
///
/// # Errors
///
/// Returns [`RotaError::Configuration`] for syntax errors and for every
/// problem [`HouseholdConfig::validate`] reports.
pub fn parse_household_config(content: &str) -> Result<HouseholdConfig> {
    let config: HouseholdConfig = toml::from_str(content)
        .map_err(|err| RotaError::Configuration(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load `.rota/config.toml` under `root`.
///
/// # Errors
///
/// Returns [`RotaError::Configuration`] if the file is missing, unreadable,
/// malformed, or fails validation.
pub fn load_household_config(root: &Path) -> Result<HouseholdConfig> {
    let path = config_path(root);
    let content = std::fs::read_to_string(&path).map_err(|err| {
        RotaError::Configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    parse_household_config(&content).map_err(|err| match err {
        RotaError::Configuration(msg) => {
            RotaError::Configuration(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Pick the output mode: `--json` flag, then `FORMAT`, then config, then
/// `pretty` on a terminal and `text` otherwise.
#[must_use]
pub fn resolve_output(cli_json: bool, config_output: Option<&str>) -> String {
    resolve_output_from(cli_json, config_output, env::var("FORMAT").ok().as_deref())
}

fn resolve_output_from(
    cli_json: bool,
    config_output: Option<&str>,
    env_format: Option<&str>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = config_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_cycles() -> u32 {
    DEFAULT_WINDOW_CYCLES
}

fn default_keyword() -> String {
    DEFAULT_KEYWORD.to_string()
}

const fn default_lookahead_minutes() -> i64 {
    DEFAULT_LOOKAHEAD_MINUTES
}

const fn default_ttl_minutes() -> i64 {
    DEFAULT_SESSION_TTL_MINUTES
}
