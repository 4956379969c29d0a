//! Configuration loading and parsing.
//!
//! Parses `knitc.toml` (or an override path provided by the binary) into the
//! compiler globals: machine geometry, carrier id, DSCS, and the cast-on /
//! cast-off selections. Unknown fields are ignored (TOML deserialization
//! tolerance) so the file format can grow without breaking old binaries.
//! `apply_context` clamps the parsed values against the machine the compile
//! actually targets; the raw parsed values are retained so a later clamp
//! against a different machine stays possible.

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

/// Where the piece sits on the bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeedlePos {
    #[default]
    Left,
    /// Defer to the controller (written as the zero sentinel).
    Right,
    At(u16),
}

#[derive(Debug, Deserialize, Clone)]
pub struct MachineConfig {
    #[serde(default = "MachineConfig::default_max_needles")]
    pub max_needles: u16,
    #[serde(default = "MachineConfig::default_carrier")]
    pub carrier: u8,
    #[serde(default)]
    pub use_dscs: bool,
    /// "left", "right", or an explicit needle number.
    #[serde(default)]
    pub needle_pos: Option<toml::Value>,
}

impl MachineConfig {
    fn default_max_needles() -> u16 {
        540
    }

    fn default_carrier() -> u8 {
        1
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            max_needles: Self::default_max_needles(),
            carrier: Self::default_carrier(),
            use_dscs: false,
            needle_pos: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CastConfig {
    /// interlock | kickback | tuck | precast | none
    #[serde(default)]
    pub on: Option<String>,
    /// direct | reverse | pickup | none
    #[serde(default)]
    pub off: Option<String>,
    /// split | kickback (consumed by the tracing front end)
    #[serde(default)]
    pub increase: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub machine: MachineConfig,
    #[serde(default)]
    pub cast: CastConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file string, when one was read.
    pub raw: Option<String>,
    /// Parsed (or default) data.
    pub file: ConfigFile,
    /// Needle position after clamping, see `apply_context`.
    effective_needle_pos: NeedlePos,
}

impl Config {
    pub fn needle_pos(&self) -> NeedlePos {
        self.effective_needle_pos
    }

    /// Resolve and clamp the raw values against the actual piece width.
    /// An explicit needle number that would push the piece past the bed
    /// falls back to `Left`.
    pub fn apply_context(&mut self, piece_width: u16) {
        let parsed = match &self.file.machine.needle_pos {
            None => NeedlePos::Left,
            Some(toml::Value::String(s)) if s == "right" => NeedlePos::Right,
            Some(toml::Value::String(_)) => NeedlePos::Left,
            Some(toml::Value::Integer(n)) => NeedlePos::At((*n).clamp(0, u16::MAX as i64) as u16),
            Some(_) => NeedlePos::Left,
        };
        self.effective_needle_pos = match parsed {
            NeedlePos::At(n) if n.saturating_add(piece_width) > self.file.machine.max_needles => {
                NeedlePos::Left
            },
            other => other,
        };
    }
}

/// Default configuration location: `knitc.toml` beside the invocation, then
/// the user config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("knitc.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("knitc").join("knitc.toml");
    }
    local
}

/// Load configuration from `path` (or discovery). A missing file is not an
/// error: defaults apply.
pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if !path.exists() {
        info!(path = %path.display(), "no config file; using defaults");
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    info!(path = %path.display(), "config loaded");
    Ok(Config { raw: Some(raw), file, effective_needle_pos: NeedlePos::Left })
}
