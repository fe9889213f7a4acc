// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Non-session preferences that must survive logout.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::kv::{KeyValueStore, WriteBatch};
use super::StorageResult;

/// Theme preference key. Not part of the session record.
pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

/// Accessor for user preferences stored next to the session.
#[derive(Clone)]
pub struct Preferences {
    kv: Arc<dyn KeyValueStore>,
}

impl Preferences {
    /// Preferences over the shared key-value store.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Stored theme; unknown or missing values fall back to the default.
    pub fn theme(&self) -> StorageResult<Theme> {
        Ok(self
            .kv
            .get(THEME_KEY)?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }

    /// Persist `theme`. Independent of the session record.
    pub fn set_theme(&self, theme: Theme) -> StorageResult<()> {
        self.kv
            .apply(&WriteBatch::new().set(THEME_KEY, theme.to_string()))
    }
}
