//! Application configuration, loaded from YAML.
//!
//! ```yaml
//! vm:
//!   clock_frequency: 700
//!   quirks:
//!     shift_in_place: true
//! key_hold_frames: 6
//! keys:
//!   "1": 1
//!   q: 4
//! ```
use std::{collections::HashMap, fs, path::Path};

use log::info;
use quirk8::{Chip8Conf, KeyCode};
use serde::Deserialize;

use crate::error::AppError;

/// Frames a key stays pressed after the terminal reports it.
///
/// Terminals only report presses, so releases are synthesized.
const DEFAULT_KEY_HOLD_FRAMES: u32 = 8;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub vm: Chip8Conf,
    pub key_hold_frames: u32,
    /// Host character to keypad key.
    pub keys: HashMap<char, KeyCode>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vm: Chip8Conf::default(),
            key_hold_frames: DEFAULT_KEY_HOLD_FRAMES,
            keys: default_keymap(),
        }
    }
}

impl AppConfig {
    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, AppError> {
        let filepath = filepath.as_ref();
        info!("load config: {}", filepath.display());

        let file = fs::File::open(filepath)?;
        let config = serde_yaml::from_reader(file)?;
        Ok(config)
    }
}

/// Hex digits map to the key of the same value, `0`-`9` and `a`-`f`.
fn default_keymap() -> HashMap<char, KeyCode> {
    KeyCode::ALL
        .iter()
        .filter_map(|key| {
            let c = char::from_digit(key.as_u8() as u32, 16)?;
            Some((c, *key))
        })
        .collect()
}
