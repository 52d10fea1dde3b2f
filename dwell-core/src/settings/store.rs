//! Single source of truth for user settings
//!
//! Mutations are applied to the in-memory config synchronously. A persister
//! task watches the config channel and writes the whole config to the
//! backend after each change; a burst of changes made before it runs is
//! written once, with the latest value. Persist failures are logged and
//! recorded in [`PersistStatus`], never retried; the next change writes the
//! whole config again.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{derive, AppConfig, ColorScheme, ConfigUpdate, DerivedState, MenuCommand, OsSignals};
use crate::backend::Backend;
use crate::config::PlatformConfig;
use crate::error::{Result, RpcError};

/// OS-level signals the derived state depends on.
pub trait Platform: Send + Sync {
    fn locale(&self) -> Option<String>;
    fn color_scheme(&self) -> ColorScheme;
    fn auto_start_enabled(&self) -> bool;
}

/// [`Platform`] reading the locale from the environment, with overrides
/// from the `[platform]` config section.
#[derive(Debug, Clone, Default)]
pub struct SystemPlatform {
    overrides: PlatformConfig,
}

impl SystemPlatform {
    pub fn new(overrides: PlatformConfig) -> Self {
        Self { overrides }
    }
}

impl Platform for SystemPlatform {
    fn locale(&self) -> Option<String> {
        if let Some(locale) = &self.overrides.locale {
            return Some(locale.clone());
        }
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
    }

    fn color_scheme(&self) -> ColorScheme {
        self.overrides.color_scheme.unwrap_or_default()
    }

    fn auto_start_enabled(&self) -> bool {
        self.overrides.auto_start
    }
}

/// Events delivered by the UI shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A tray/menu item id such as `lang_zh` or `theme_dark`
    MenuItemClick(String),
    ColorSchemeChanged(ColorScheme),
    LocaleChanged(Option<String>),
}

/// Outcome of config persistence so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistStatus {
    /// Successful writes
    pub saves: u64,
    /// Failed writes
    pub failures: u64,
    /// Error from the most recent write, cleared by the next success
    pub last_error: Option<RpcError>,
}

#[derive(Default)]
struct Tasks {
    persister: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

/// Owns user settings and the derived runtime state.
pub struct ConfigSyncStore {
    config: watch::Sender<AppConfig>,
    derived: watch::Sender<DerivedState>,
    os: Mutex<OsSignals>,
    status: watch::Receiver<PersistStatus>,
    closing: watch::Sender<bool>,
    tasks: Mutex<Tasks>,
}

impl ConfigSyncStore {
    /// Load and sanitize the persisted config, then start the persister and
    /// the UI event listener.
    ///
    /// A failing config load is returned to the caller unchanged.
    pub async fn init(
        backend: Arc<dyn Backend>,
        platform: &dyn Platform,
        events: mpsc::UnboundedReceiver<UiEvent>,
    ) -> Result<Arc<Self>> {
        let mut loaded = backend.get_app_config().await?;
        let replaced = loaded.sanitize();
        if !replaced.is_empty() {
            tracing::info!(fields = ?replaced, "Sanitized loaded app config");
        }

        let os = OsSignals {
            locale: platform.locale(),
            color_scheme: platform.color_scheme(),
            auto_start: platform.auto_start_enabled(),
        };
        let derived = derive(&loaded, &os);
        tracing::debug!(?derived, "Derived initial settings");

        let (config_tx, config_rx) = watch::channel(loaded);
        let (derived_tx, _) = watch::channel(derived);
        let (status_tx, status_rx) = watch::channel(PersistStatus::default());
        let (closing_tx, closing_rx) = watch::channel(false);

        let store = Arc::new(Self {
            config: config_tx,
            derived: derived_tx,
            os: Mutex::new(os),
            status: status_rx,
            closing: closing_tx,
            tasks: Mutex::new(Tasks::default()),
        });

        let persister = tokio::spawn(persist_loop(backend, config_rx, status_tx, closing_rx));
        let listener = tokio::spawn(listen_loop(Arc::downgrade(&store), events));
        *store.tasks.lock().unwrap() = Tasks {
            persister: Some(persister),
            listener: Some(listener),
        };

        Ok(store)
    }

    /// Current config.
    pub fn config(&self) -> AppConfig {
        self.config.borrow().clone()
    }

    /// Current derived state.
    pub fn derived(&self) -> DerivedState {
        *self.derived.borrow()
    }

    pub fn subscribe_config(&self) -> watch::Receiver<AppConfig> {
        self.config.subscribe()
    }

    pub fn subscribe_derived(&self) -> watch::Receiver<DerivedState> {
        self.derived.subscribe()
    }

    pub fn persist_status(&self) -> watch::Receiver<PersistStatus> {
        self.status.clone()
    }

    /// Apply one field change. Returns whether the config changed.
    pub fn set(&self, update: ConfigUpdate) -> bool {
        let changed = self.config.send_if_modified(|config| {
            let before = config.clone();
            update.apply(config);
            config.sanitize();
            *config != before
        });
        if changed {
            self.recompute();
        }
        changed
    }

    /// Apply a decoded menu command.
    pub fn apply_menu(&self, command: MenuCommand) -> bool {
        tracing::debug!(%command, "Applying menu command");
        self.set(command.into())
    }

    /// OS color scheme changed; affects the theme only under `system`.
    pub fn on_color_scheme_change(&self, scheme: ColorScheme) {
        self.os.lock().unwrap().color_scheme = scheme;
        self.recompute();
    }

    /// OS locale changed; affects the language only under `system`.
    pub fn on_locale_change(&self, locale: Option<String>) {
        self.os.lock().unwrap().locale = locale;
        self.recompute();
    }

    pub fn handle_event(&self, event: UiEvent) {
        match event {
            UiEvent::MenuItemClick(id) => match id.parse::<MenuCommand>() {
                Ok(command) => {
                    self.apply_menu(command);
                }
                Err(_) => tracing::debug!(id = %id, "Ignoring unrelated menu item"),
            },
            UiEvent::ColorSchemeChanged(scheme) => self.on_color_scheme_change(scheme),
            UiEvent::LocaleChanged(locale) => self.on_locale_change(locale),
        }
    }

    /// Stop listening for UI events and wait for the last config write.
    pub async fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        if let Some(listener) = tasks.listener {
            listener.abort();
        }
        let _ = self.closing.send(true);
        if let Some(persister) = tasks.persister {
            if let Err(err) = persister.await {
                tracing::warn!(error = %err, "Config persister ended abnormally");
            }
        }
    }

    /// Inputs are read under the `derived` lock so the last writer always
    /// publishes from the latest config and OS signals.
    fn recompute(&self) {
        self.derived.send_if_modified(|current| {
            let next = derive(&self.config.borrow(), &self.os.lock().unwrap());
            if *current == next {
                return false;
            }
            tracing::debug!(?next, "Derived settings changed");
            *current = next;
            true
        });
    }
}

async fn listen_loop(store: Weak<ConfigSyncStore>, mut events: mpsc::UnboundedReceiver<UiEvent>) {
    while let Some(event) = events.recv().await {
        let Some(store) = store.upgrade() else {
            break;
        };
        store.handle_event(event);
    }
    tracing::debug!("UI event listener stopped");
}

async fn persist_loop(
    backend: Arc<dyn Backend>,
    mut config: watch::Receiver<AppConfig>,
    status: watch::Sender<PersistStatus>,
    mut closing: watch::Receiver<bool>,
) {
    loop {
        // Pending changes win over the close signal so the last write lands.
        tokio::select! {
            biased;
            changed = config.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = closing.changed() => break,
        }

        let snapshot = config.borrow_and_update().clone();
        match backend.set_app_config(&snapshot).await {
            Ok(()) => {
                tracing::debug!("Persisted app config");
                status.send_modify(|s| {
                    s.saves += 1;
                    s.last_error = None;
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to persist app config");
                status.send_modify(|s| {
                    s.failures += 1;
                    s.last_error = Some(err);
                });
            }
        }
    }
}
