//! User settings for dualmark
//!
//! This module defines the `Settings` struct that holds all user-configurable
//! options, with serde support for JSON persistence.

use serde::{Deserialize, Serialize};

use crate::markdown::MarkdownOptions;

// ─────────────────────────────────────────────────────────────────────────────
// Autosave Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Autosave timer periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveSettings {
    /// Quiet period after the last edit before saving (milliseconds)
    pub debounce_ms: u64,

    /// Period of the backstop save during continuous editing (milliseconds)
    pub interval_ms: u64,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            interval_ms: 30_000,
        }
    }
}

impl AutosaveSettings {
    /// Clamp the timer periods to the ranges in [`Settings`].
    pub fn sanitize(&mut self) {
        self.debounce_ms = self
            .debounce_ms
            .clamp(Settings::MIN_DEBOUNCE_MS, Settings::MAX_DEBOUNCE_MS);

        // The backstop never fires more often than the debounce
        self.interval_ms = self
            .interval_ms
            .max(Settings::MIN_INTERVAL_MS)
            .max(self.debounce_ms);
    }

    /// Copy with the timer periods clamped.
    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// User preferences and application settings.
///
/// This struct is serialized to JSON and persisted to the user's config directory.
/// All fields have sensible defaults via the `Default` trait and `#[serde(default)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Markdown grammar extensions
    pub markdown: MarkdownOptions,

    /// Autosave timing
    pub autosave: AutosaveSettings,
}

impl Settings {
    /// Minimum debounce delay.
    pub const MIN_DEBOUNCE_MS: u64 = 50;
    /// Maximum debounce delay.
    pub const MAX_DEBOUNCE_MS: u64 = 60_000;
    /// Minimum backstop interval.
    pub const MIN_INTERVAL_MS: u64 = 5_000;

    /// Sanitize settings by clamping values to valid ranges.
    ///
    /// This is useful after loading settings from a file that might have
    /// been manually edited with invalid values.
    pub fn sanitize(&mut self) {
        self.autosave.sanitize();
    }

    /// Load settings and sanitize them to ensure validity.
    ///
    /// This is a convenience method that deserializes and then sanitizes.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
