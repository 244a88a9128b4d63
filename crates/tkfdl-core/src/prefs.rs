//! Per-screen preferences: last loaded URL and form column widths.
//!
//! Stored as TOML under the XDG state directory, one file per screen.
//! Width values are free text (`140px`, `12%`, ...) and kept verbatim.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A form column whose width the user can override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub default_width: &'static str,
}

const fn col(name: &'static str, label: &'static str, default_width: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        label,
        default_width,
    }
}

/// Columns of the leakage-test table, in display order.
pub const LEAKAGE_COLUMNS: [ColumnSpec; 9] = [
    col("MeasuredLocation", "Ölçüm yapılan Yer", "140px"),
    col("LeakageRole", "Kaç. Ak. Rolesi", "100px"),
    col("TestCoefficient", "Test Katsayısı", "60px"),
    col("OpenningCurrent", "Açma Akımı(mA)", "70px"),
    col("OpenningValue", "Açma Zamanı(mS)", "70px"),
    col("Otomet", "Otomat", "80px"),
    col("TestPoint", "Test Noktası", "130px"),
    col("RCDNo", "RCD No", "80px"),
    col("Result", "Sonuç", "130px"),
];

pub const DEFAULT_SCREEN: &str = "leakage";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub last_url: String,
    #[serde(default)]
    pub column_widths: BTreeMap<String, String>,
}

/// `$XDG_STATE_HOME/tkfdl/<screen>.toml`
pub fn prefs_path(screen: &str) -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tkfdl")?;
    Ok(xdg_dirs.place_state_file(format!("{screen}.toml"))?)
}

impl Preferences {
    /// Read from `path`; a missing file yields empty preferences.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read preferences: {}", path.display()))?;
        let prefs = toml::from_str(&data)
            .with_context(|| format!("invalid preferences: {}", path.display()))?;
        Ok(prefs)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("failed to write preferences: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "preferences saved");
        Ok(())
    }

    pub fn last_url(&self) -> Option<&str> {
        Some(self.last_url.as_str()).filter(|u| !u.is_empty())
    }

    pub fn set_last_url(&mut self, url: &str) {
        self.last_url = url.trim().to_string();
    }

    pub fn set_column_width(&mut self, column: &str, width: &str) {
        self.column_widths
            .insert(column.to_string(), width.to_string());
    }

    /// Stored width, else the column's default. `None` for unknown columns
    /// without a stored value.
    pub fn column_width(&self, column: &str) -> Option<&str> {
        self.column_widths
            .get(column)
            .map(String::as_str)
            .or_else(|| {
                LEAKAGE_COLUMNS
                    .iter()
                    .find(|c| c.name == column)
                    .map(|c| c.default_width)
            })
    }

    /// Effective width of every known column, then any other stored ones.
    pub fn effective_widths(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = LEAKAGE_COLUMNS
            .iter()
            .map(|c| {
                let w = self.column_width(c.name).unwrap_or(c.default_width);
                (c.name.to_string(), w.to_string())
            })
            .collect();
        for (k, v) in &self.column_widths {
            if !LEAKAGE_COLUMNS.iter().any(|c| c.name == k) {
                out.push((k.clone(), v.clone()));
            }
        }
        out
    }
}
