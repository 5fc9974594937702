use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sheetfeed_core::{Destination, ExtractionConfig, DEFAULT_TAB};
use sheetfeed_upload::ServiceAccountCredential;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "sheetfeed.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub destination: DestinationSection,
    pub extraction: ExtractionConfig,
    pub upload: UploadSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationSection {
    /// Bare id or the full sheet URL
    pub spreadsheet_id: String,
    pub tab: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub batch_rows: usize,
    /// "USER_ENTERED" or "RAW"
    pub value_input_option: String,
    /// Path to the service-account key. Environment variables take precedence.
    pub credentials_file: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for DestinationSection {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            tab: DEFAULT_TAB.to_string(),
        }
    }
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            batch_rows: 500,
            value_input_option: "USER_ENTERED".to_string(),
            credentials_file: None,
        }
    }
}

impl Config {
    pub fn destination(&self) -> Destination {
        Destination::new(
            Destination::normalize_id(&self.destination.spreadsheet_id),
            self.destination.tab.clone(),
        )
    }

    /// Overlay `SHEETFEED_*` settings from the environment (or any lookup).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("SHEETFEED_SPREADSHEET_ID") {
            self.destination.spreadsheet_id = id;
        }
        if let Some(tab) = lookup("SHEETFEED_TAB") {
            self.destination.tab = tab;
        }
        if let Some(bind) = lookup("SHEETFEED_BIND") {
            self.server.bind = bind;
        }
    }

    /// Settings every upload needs.
    pub fn validate_for_upload(&self) -> Result<()> {
        if self.destination.spreadsheet_id.trim().is_empty() {
            bail!("no spreadsheet configured: set destination.spreadsheet_id or SHEETFEED_SPREADSHEET_ID");
        }
        if self.destination.tab.trim().is_empty() {
            bail!("destination.tab must not be empty");
        }
        match self.upload.value_input_option.as_str() {
            "USER_ENTERED" | "RAW" => {}
            other => bail!("upload.value_input_option must be USER_ENTERED or RAW, got {other}"),
        }
        Ok(())
    }
}

/// Explicit path, else `SHEETFEED_CONFIG`, else `./sheetfeed.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("SHEETFEED_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the file (defaults when it does not exist) and apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut cfg = read_config_file(path)?;
    cfg.apply_env(|k| std::env::var(k).ok());
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    save_config(path, &Config::default())?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Resolve the service-account key: inline JSON, then key file variables,
/// then `upload.credentials_file`.
pub fn load_credential(
    cfg: &Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServiceAccountCredential> {
    if let Some(json) = lookup("SHEETFEED_SERVICE_ACCOUNT_JSON").filter(|j| !j.trim().is_empty()) {
        return Ok(ServiceAccountCredential::from_json(json));
    }

    let path = lookup("SHEETFEED_SERVICE_ACCOUNT_FILE")
        .or_else(|| lookup("GOOGLE_APPLICATION_CREDENTIALS"))
        .map(PathBuf::from)
        .or_else(|| cfg.upload.credentials_file.clone());

    match path {
        Some(p) => ServiceAccountCredential::from_file(&p)
            .with_context(|| format!("read service account key {}", p.display())),
        None => bail!(
            "no service account credential: set SHEETFEED_SERVICE_ACCOUNT_JSON, \
             SHEETFEED_SERVICE_ACCOUNT_FILE or GOOGLE_APPLICATION_CREDENTIALS"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = read_config_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.destination.tab, "Raw_Data");
        assert_eq!(cfg.upload.batch_rows, 500);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[destination]
spreadsheet_id = "https://docs.google.com/spreadsheets/d/1AbC-xyz_09/edit#gid=0"

[extraction]
date_formats = ["%m/%d/%Y"]
"#
        )
        .unwrap();

        let cfg = read_config_file(f.path()).unwrap();
        assert_eq!(cfg.destination().spreadsheet_id, "1AbC-xyz_09");
        assert_eq!(cfg.destination().tab, "Raw_Data");
        assert_eq!(cfg.extraction.date_formats, vec!["%m/%d/%Y".to_string()]);
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheetfeed.toml");
        let mut cfg = Config::default();
        cfg.destination.spreadsheet_id = "abc".into();
        save_config(&path, &cfg).unwrap();
        assert_eq!(read_config_file(&path).unwrap(), cfg);
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("SHEETFEED_SPREADSHEET_ID", "from-env"),
            ("SHEETFEED_BIND", "0.0.0.0:9000"),
        ]));
        assert_eq!(cfg.destination.spreadsheet_id, "from-env");
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.destination.tab, "Raw_Data");
    }

    #[test]
    fn test_validate_for_upload() {
        let mut cfg = Config::default();
        assert!(cfg.validate_for_upload().is_err());
        cfg.destination.spreadsheet_id = "abc".into();
        assert!(cfg.validate_for_upload().is_ok());
        cfg.upload.value_input_option = "FORMULA".into();
        assert!(cfg.validate_for_upload().is_err());
    }

    #[test]
    fn test_credential_precedence() {
        let mut key = tempfile::NamedTempFile::new().unwrap();
        write!(key, r#"{{"client_email": "file@example.iam.gserviceaccount.com"}}"#).unwrap();
        let path = key.path().to_string_lossy().to_string();

        let cfg = Config::default();
        let inline = load_credential(
            &cfg,
            env(&[
                ("SHEETFEED_SERVICE_ACCOUNT_JSON", r#"{"client_email": "inline@example.iam.gserviceaccount.com"}"#),
                ("GOOGLE_APPLICATION_CREDENTIALS", path.as_str()),
            ]),
        )
        .unwrap();
        assert_eq!(
            inline.client_email().as_deref(),
            Some("inline@example.iam.gserviceaccount.com")
        );

        let from_file = load_credential(&cfg, env(&[("GOOGLE_APPLICATION_CREDENTIALS", path.as_str())])).unwrap();
        assert_eq!(
            from_file.client_email().as_deref(),
            Some("file@example.iam.gserviceaccount.com")
        );

        assert!(load_credential(&cfg, env(&[])).is_err());
    }
}
