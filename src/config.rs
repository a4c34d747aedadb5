use chrono::Utc;
use directories::{BaseDirs, ProjectDirs};
use inquire::{Select, Text};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::draft::parse_amount;
use crate::error::{Error, Result};
use crate::model::{Currency, InvoiceDraft};

pub const BACKEND_URL_ENV: &str = "INVOICE_BACKEND_URL";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub data_root: String,
    pub backend_url: String,
    pub typst_bin: String,
    pub default_currency: Currency,
    pub default_tax_rate: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            data_root: "~/Documents/Invoices".to_string(),
            backend_url: "http://localhost:8001".to_string(),
            typst_bin: "typst".to_string(),
            default_currency: Currency::Usd,
            default_tax_rate: 0.0,
        }
    }
}

impl AppSettings {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root().join("store")
    }

    pub fn template_dir(&self) -> PathBuf {
        self.root().join("templates")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("output")
    }

    /// A new session draft carrying the configured defaults.
    pub fn fresh_draft(&self) -> InvoiceDraft {
        let mut draft = InvoiceDraft::new(Utc::now());
        draft.currency = self.default_currency;
        draft.tax_rate = self.default_tax_rate;
        draft
    }

    pub fn with_backend_override(mut self, backend_url: Option<String>) -> Self {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            debug!(%url, "backend URL overridden from environment");
            self.backend_url = url;
        }
        self
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&content)?))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn get_config_path() -> PathBuf {
    match ProjectDirs::from("com", "brand-invoice", "app") {
        Some(proj_dirs) => proj_dirs.config_dir().join("settings.toml"),
        None => PathBuf::from("settings.toml"),
    }
}

/// Settings file (or defaults), then environment overrides.
pub fn load_settings() -> Result<AppSettings> {
    let path = get_config_path();
    let settings = AppSettings::load_from(&path)?.unwrap_or_else(|| {
        info!(path = %path.display(), "no settings file, using defaults");
        AppSettings::default()
    });
    Ok(settings.with_backend_override(std::env::var(BACKEND_URL_ENV).ok()))
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

pub fn setup_config_wizard() -> Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let path = get_config_path();
    let current = AppSettings::load_from(&path)?.unwrap_or_default();

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Root Data Directory")
        .pick_folder();

    let data_root = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            prompt_text("Enter Root Data Directory:", &current.data_root)?
        }
    };

    let backend_url = prompt_text("Mail relay base URL:", &current.backend_url)?;
    let typst_bin = prompt_text("Typst executable:", &current.typst_bin)?;

    let start = Currency::ALL.iter().position(|c| *c == current.default_currency).unwrap_or(0);
    let default_currency = Select::new("Default currency:", Currency::ALL.to_vec())
        .with_starting_cursor(start)
        .prompt()
        .map_err(|e| Error::Config(e.to_string()))?;

    let tax_raw = prompt_text("Default tax rate %:", &current.default_tax_rate.to_string())?;

    let settings = AppSettings {
        data_root,
        backend_url,
        typst_bin,
        default_currency,
        default_tax_rate: parse_amount(&tax_raw),
    };
    settings.save_to(&path)?;
    println!("✅ Settings saved to {}", path.display());
    Ok(settings)
}

fn prompt_text(message: &str, default: &str) -> Result<String> {
    Text::new(message)
        .with_default(default)
        .prompt()
        .map_err(|e| Error::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_no_settings() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(AppSettings::load_from(&dir.path().join("settings.toml")).unwrap(), None);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "data_root = \"/srv/invoices\"\ndefault_currency = \"GBP\"\n").unwrap();

        let settings = AppSettings::load_from(&path).unwrap().unwrap();
        assert_eq!(settings.data_root, "/srv/invoices");
        assert_eq!(settings.default_currency, Currency::Gbp);
        assert_eq!(settings.typst_bin, "typst");
        assert_eq!(settings.store_dir(), PathBuf::from("/srv/invoices/store"));
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = AppSettings {
            data_root: "/tmp/inv".into(),
            backend_url: "https://relay.example".into(),
            typst_bin: "/opt/typst".into(),
            default_currency: Currency::Jpy,
            default_tax_rate: 8.0,
        };
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), Some(settings));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "data_root = [").unwrap();
        assert!(matches!(AppSettings::load_from(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn backend_override_ignores_blank_values() {
        let base = AppSettings::default();
        assert_eq!(base.clone().with_backend_override(Some("  ".into())).backend_url, base.backend_url);
        assert_eq!(base.with_backend_override(Some("https://mail.example".into())).backend_url, "https://mail.example");
    }

    #[test]
    fn fresh_draft_uses_configured_defaults() {
        let settings = AppSettings { default_currency: Currency::Eur, default_tax_rate: 20.0, ..AppSettings::default() };
        let draft = settings.fresh_draft();
        assert_eq!(draft.currency, Currency::Eur);
        assert_eq!(draft.tax_rate, 20.0);
    }

    #[test]
    fn home_is_expanded_only_at_the_start() {
        assert_eq!(expand_home_dir("/abs/path"), "/abs/path");
        if let Some(base) = BaseDirs::new() {
            let expanded = expand_home_dir("~/Invoices");
            assert!(expanded.starts_with(&*base.home_dir().to_string_lossy()));
            assert!(expanded.ends_with("/Invoices"));
        }
    }
}
