//! User settings and the state derived from them
//!
//! [`AppConfig`] is what the backend persists. Language and theme may hold
//! the `system` sentinel; the concrete values are computed at read time by
//! [`derive`] so the stored config stays portable across machines.

mod store;

pub use store::{ConfigSyncStore, PersistStatus, Platform, SystemPlatform, UiEvent};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Date patterns a front end knows how to render.
pub const DATE_FORMATS: &[&str] = &[
    "yyyy-MM-dd",
    "yyyy/MM/dd",
    "yyyy/M/d",
    "MM/dd/yyyy",
    "dd/MM/yyyy",
    "dd.MM.yyyy",
];

/// Time patterns a front end knows how to render.
pub const TIME_FORMATS: &[&str] = &["HH:mm:ss", "H:mm:ss", "hh:mm:ss a", "h:mm:ss a", "HH:mm", "H:mm"];

pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd";
pub const DEFAULT_TIME_FORMAT: &str = "HH:mm:ss";

// ============================================
// Enumerated settings
// ============================================

/// Concrete UI language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
}

impl Language {
    /// Map an OS locale such as `zh_CN.UTF-8` or `en-US`.
    pub fn from_locale(locale: Option<&str>) -> Self {
        match locale {
            Some(l) if l.to_ascii_lowercase().starts_with("zh") => Language::Zh,
            _ => Language::En,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }
}

/// Concrete UI theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

/// Color scheme reported by the OS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl FromStr for ColorScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(ColorScheme::Light),
            "dark" => Ok(ColorScheme::Dark),
            _ => Err(Error::Config(format!("unknown color scheme: {}", s))),
        }
    }
}

/// Stored language choice; `System` follows the OS locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageConfig {
    En,
    Zh,
    #[default]
    #[serde(other)]
    System,
}

impl LanguageConfig {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageConfig::En => "en",
            LanguageConfig::Zh => "zh",
            LanguageConfig::System => "system",
        }
    }
}

impl FromStr for LanguageConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "en" => Ok(LanguageConfig::En),
            "zh" => Ok(LanguageConfig::Zh),
            "system" => Ok(LanguageConfig::System),
            _ => Err(Error::Config(format!("unknown language: {}", s))),
        }
    }
}

/// Stored theme choice; `System` follows the OS color scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeConfig {
    Dark,
    Light,
    #[default]
    #[serde(other)]
    System,
}

impl ThemeConfig {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeConfig::Dark => "dark",
            ThemeConfig::Light => "light",
            ThemeConfig::System => "system",
        }
    }
}

impl FromStr for ThemeConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dark" => Ok(ThemeConfig::Dark),
            "light" => Ok(ThemeConfig::Light),
            "system" => Ok(ThemeConfig::System),
            _ => Err(Error::Config(format!("unknown theme: {}", s))),
        }
    }
}

// ============================================
// AppConfig
// ============================================

/// User settings, persisted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub lang: LanguageConfig,
    pub theme: ThemeConfig,
    /// Hide apps whose executable no longer exists
    pub filter_uninstalled_app: bool,
    /// 0 = Monday ... 6 = Sunday
    pub first_day_of_week: u8,
    pub date_format: String,
    pub time_format: String,
    pub auto_check_update: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lang: LanguageConfig::System,
            theme: ThemeConfig::System,
            filter_uninstalled_app: true,
            first_day_of_week: 0,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            auto_check_update: true,
        }
    }
}

impl AppConfig {
    /// Replace out-of-domain fields with defaults.
    ///
    /// Returns the names of the fields that were replaced. Substitutions are
    /// logged and never treated as errors.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut replaced = Vec::new();

        if self.first_day_of_week > 6 {
            tracing::warn!(value = self.first_day_of_week, "Invalid firstDayOfWeek, using 0");
            self.first_day_of_week = 0;
            replaced.push("firstDayOfWeek");
        }
        if !DATE_FORMATS.contains(&self.date_format.as_str()) {
            tracing::warn!(value = %self.date_format, "Unsupported dateFormat, using default");
            self.date_format = DEFAULT_DATE_FORMAT.to_string();
            replaced.push("dateFormat");
        }
        if !TIME_FORMATS.contains(&self.time_format.as_str()) {
            tracing::warn!(value = %self.time_format, "Unsupported timeFormat, using default");
            self.time_format = DEFAULT_TIME_FORMAT.to_string();
            replaced.push("timeFormat");
        }

        replaced
    }
}

// ============================================
// Updates and menu commands
// ============================================

/// A single-field change to [`AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigUpdate {
    Language(LanguageConfig),
    Theme(ThemeConfig),
    FilterUninstalledApp(bool),
    FirstDayOfWeek(u8),
    DateFormat(String),
    TimeFormat(String),
    AutoCheckUpdate(bool),
}

impl ConfigUpdate {
    /// Parse a `field value` pair using the wire field names.
    pub fn parse(field: &str, value: &str) -> Result<Self> {
        let parse_bool = |v: &str| {
            v.parse::<bool>()
                .map_err(|_| Error::Config(format!("{} expects true or false, got {}", field, v)))
        };

        match field {
            "lang" => Ok(ConfigUpdate::Language(value.parse()?)),
            "theme" => Ok(ConfigUpdate::Theme(value.parse()?)),
            "filterUninstalledApp" => Ok(ConfigUpdate::FilterUninstalledApp(parse_bool(value)?)),
            "firstDayOfWeek" => value
                .parse::<u8>()
                .ok()
                .filter(|d| *d <= 6)
                .map(ConfigUpdate::FirstDayOfWeek)
                .ok_or_else(|| Error::Config(format!("firstDayOfWeek must be 0-6, got {}", value))),
            "dateFormat" => Ok(ConfigUpdate::DateFormat(value.to_string())),
            "timeFormat" => Ok(ConfigUpdate::TimeFormat(value.to_string())),
            "autoCheckUpdate" => Ok(ConfigUpdate::AutoCheckUpdate(parse_bool(value)?)),
            _ => Err(Error::Config(format!("unknown config field: {}", field))),
        }
    }

    pub fn apply(self, config: &mut AppConfig) {
        match self {
            ConfigUpdate::Language(lang) => config.lang = lang,
            ConfigUpdate::Theme(theme) => config.theme = theme,
            ConfigUpdate::FilterUninstalledApp(v) => config.filter_uninstalled_app = v,
            ConfigUpdate::FirstDayOfWeek(d) => config.first_day_of_week = d,
            ConfigUpdate::DateFormat(f) => config.date_format = f,
            ConfigUpdate::TimeFormat(f) => config.time_format = f,
            ConfigUpdate::AutoCheckUpdate(v) => config.auto_check_update = v,
        }
    }
}

/// A decoded tray/menu command.
///
/// Menu item ids arrive as `lang_<value>` or `theme_<value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    SetLanguage(LanguageConfig),
    SetTheme(ThemeConfig),
}

impl FromStr for MenuCommand {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self> {
        if let Some(lang) = id.strip_prefix("lang_") {
            Ok(MenuCommand::SetLanguage(lang.parse()?))
        } else if let Some(theme) = id.strip_prefix("theme_") {
            Ok(MenuCommand::SetTheme(theme.parse()?))
        } else {
            Err(Error::Config(format!("unknown menu item: {}", id)))
        }
    }
}

impl fmt::Display for MenuCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuCommand::SetLanguage(lang) => write!(f, "lang_{}", lang.as_str()),
            MenuCommand::SetTheme(theme) => write!(f, "theme_{}", theme.as_str()),
        }
    }
}

impl From<MenuCommand> for ConfigUpdate {
    fn from(cmd: MenuCommand) -> Self {
        match cmd {
            MenuCommand::SetLanguage(lang) => ConfigUpdate::Language(lang),
            MenuCommand::SetTheme(theme) => ConfigUpdate::Theme(theme),
        }
    }
}

// ============================================
// Derived state
// ============================================

/// What the OS currently reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsSignals {
    pub locale: Option<String>,
    pub color_scheme: ColorScheme,
    pub auto_start: bool,
}

/// Effective settings after resolving `system` sentinels. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedState {
    pub effective_lang: Language,
    pub effective_theme: Theme,
    pub auto_start: bool,
}

/// Resolve `system` sentinels against the OS signals.
pub fn derive(config: &AppConfig, os: &OsSignals) -> DerivedState {
    let effective_lang = match config.lang {
        LanguageConfig::En => Language::En,
        LanguageConfig::Zh => Language::Zh,
        LanguageConfig::System => Language::from_locale(os.locale.as_deref()),
    };
    let effective_theme = match config.theme {
        ThemeConfig::Dark => Theme::Dark,
        ThemeConfig::Light => Theme::Light,
        ThemeConfig::System => match os.color_scheme {
            ColorScheme::Light => Theme::Light,
            ColorScheme::Dark => Theme::Dark,
        },
    };
    DerivedState {
        effective_lang,
        effective_theme,
        auto_start: os.auto_start,
    }
}
