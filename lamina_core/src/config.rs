// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime configuration.
//!
//! ```toml
//! [input]
//! click_to_focus = true
//!
//! [grabs]
//! move_resize = 100
//! drag = 200
//! popup = 300
//! input_lock = 1000
//! ```
//!
//! Every key is optional; missing keys keep their default.

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Input routing settings.
    pub input: InputConfig,
    /// Priorities of the stock grabs.
    pub grabs: GrabPriorities,
}

impl Config {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// `[input]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Pressing a pointer button over a surface gives its toplevel keyboard
    /// focus.
    pub click_to_focus: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            click_to_focus: true,
        }
    }
}

/// `[grabs]` section. Higher values win.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrabPriorities {
    /// Interactive move and resize.
    pub move_resize: i32,
    /// Drag-and-drop.
    pub drag: i32,
    /// Popup dismissal.
    pub popup: i32,
    /// Exclusive input lock.
    pub input_lock: i32,
}

impl Default for GrabPriorities {
    fn default() -> Self {
        Self {
            move_resize: 100,
            drag: 200,
            popup: 300,
            input_lock: 1000,
        }
    }
}
