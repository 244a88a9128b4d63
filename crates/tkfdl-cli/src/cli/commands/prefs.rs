//! `tkfdl prefs` – per-screen preferences.

use anyhow::{bail, Result};
use tkfdl_core::prefs::{prefs_path, Preferences, LEAKAGE_COLUMNS};

use crate::cli::PrefsAction;

pub fn run_prefs(screen: &str, action: PrefsAction) -> Result<()> {
    let path = prefs_path(screen)?;
    let mut prefs = Preferences::load(&path)?;

    match action {
        PrefsAction::Show => {
            println!("last url: {}", prefs.last_url().unwrap_or("-"));
            println!("{:<18} {:<8} {}", "COLUMN", "WIDTH", "LABEL");
            for (name, width) in prefs.effective_widths() {
                let label = LEAKAGE_COLUMNS
                    .iter()
                    .find(|c| c.name == name)
                    .map(|c| c.label)
                    .unwrap_or("");
                println!("{:<18} {:<8} {}", name, width, label);
            }
            return Ok(());
        }
        PrefsAction::SetUrl { url } => prefs.set_last_url(&url),
        PrefsAction::SetWidth { column, width } => {
            if !LEAKAGE_COLUMNS.iter().any(|c| c.name == column) {
                bail!("unknown column: {column}");
            }
            prefs.set_column_width(&column, &width);
        }
    }

    prefs.save(&path)?;
    println!("Saved {}", path.display());
    Ok(())
}
