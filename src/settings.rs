//! Feature flags consumed by the pipeline.
//!
//! The parser and applier read flags through the [Settings] trait on every
//! decision point rather than caching them, so a host can flip tracking on
//! or off between (or during) batches and see it take effect immediately.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Live feature toggles. Implementations must tolerate concurrent reads
/// from multiple worker threads.
pub trait Settings: Send + Sync {
    fn track_wounds(&self) -> bool;
    fn track_statuses(&self) -> bool;
    fn track_ucs(&self) -> bool;
    fn debug_enabled(&self) -> bool;
}

/// Atomic-backed settings, flippable at runtime.
#[derive(Debug)]
pub struct TrackerSettings {
    track_wounds: AtomicBool,
    track_statuses: AtomicBool,
    track_ucs: AtomicBool,
    debug: AtomicBool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            track_wounds: AtomicBool::new(true),
            track_statuses: AtomicBool::new(true),
            track_ucs: AtomicBool::new(true),
            debug: AtomicBool::new(false),
        }
    }
}

impl TrackerSettings {
    /// Build from environment overrides (`FRAY_TRACK_WOUNDS`,
    /// `FRAY_TRACK_STATUSES`, `FRAY_TRACK_UCS`, `FRAY_DEBUG`); any value
    /// other than `0`/`false` counts as enabled, unset keeps the default.
    pub fn from_env() -> Self {
        let settings = Self::default();
        if let Some(v) = env_flag("FRAY_TRACK_WOUNDS") {
            settings.set_track_wounds(v);
        }
        if let Some(v) = env_flag("FRAY_TRACK_STATUSES") {
            settings.set_track_statuses(v);
        }
        if let Some(v) = env_flag("FRAY_TRACK_UCS") {
            settings.set_track_ucs(v);
        }
        if let Some(v) = env_flag("FRAY_DEBUG") {
            settings.set_debug(v);
        }
        settings
    }

    pub fn from_snapshot(snapshot: &SettingsSnapshot) -> Self {
        let settings = Self::default();
        settings.set_track_wounds(snapshot.track_wounds);
        settings.set_track_statuses(snapshot.track_statuses);
        settings.set_track_ucs(snapshot.track_ucs);
        settings.set_debug(snapshot.debug);
        settings
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            track_wounds: self.track_wounds(),
            track_statuses: self.track_statuses(),
            track_ucs: self.track_ucs(),
            debug: self.debug_enabled(),
        }
    }

    pub fn set_track_wounds(&self, on: bool) {
        self.track_wounds.store(on, Ordering::Relaxed);
    }

    pub fn set_track_statuses(&self, on: bool) {
        self.track_statuses.store(on, Ordering::Relaxed);
    }

    pub fn set_track_ucs(&self, on: bool) {
        self.track_ucs.store(on, Ordering::Relaxed);
    }

    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Relaxed);
    }
}

impl Settings for TrackerSettings {
    fn track_wounds(&self) -> bool {
        self.track_wounds.load(Ordering::Relaxed)
    }

    fn track_statuses(&self) -> bool {
        self.track_statuses.load(Ordering::Relaxed)
    }

    fn track_ucs(&self) -> bool {
        self.track_ucs.load(Ordering::Relaxed)
    }

    fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}

/// Plain serializable form of [TrackerSettings] for config files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub track_wounds: bool,
    pub track_statuses: bool,
    pub track_ucs: bool,
    #[serde(default)]
    pub debug: bool,
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    let lower = raw.trim().to_ascii_lowercase();
    Some(!(lower.is_empty() || lower == "0" || lower == "false"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_track_everything_without_debug() {
        let s = TrackerSettings::default();
        assert!(s.track_wounds());
        assert!(s.track_statuses());
        assert!(s.track_ucs());
        assert!(!s.debug_enabled());
    }

    #[test]
    fn snapshot_round_trip() {
        let s = TrackerSettings::default();
        s.set_track_statuses(false);
        s.set_debug(true);
        let snap = s.snapshot();
        let json = serde_json::to_string(&snap).expect("serialize");
        let back: SettingsSnapshot = serde_json::from_str(&json).expect("parse");
        let restored = TrackerSettings::from_snapshot(&back);
        assert!(restored.track_wounds());
        assert!(!restored.track_statuses());
        assert!(restored.debug_enabled());
    }

    #[test]
    fn flags_flip_at_runtime() {
        let s = TrackerSettings::default();
        s.set_track_wounds(false);
        assert!(!s.track_wounds());
        s.set_track_wounds(true);
        assert!(s.track_wounds());
    }
}
