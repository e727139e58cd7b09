//! Provider configuration (spec §6.1): the JSON file naming the gateway this
//! CLI talks to. Layered the way `agenticlaw-core::openclaw_config` loads its
//! config — a `#[serde(default)]` struct, a `load`/`discover` pair, tilde
//! expansion for the default path — generalized to the one file this crate
//! actually needs instead of openclaw's full settings tree.

use gatecode_core::ModelPricing;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_timeout_ms() -> u64 {
    600_000
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Required fields have no default — a config file missing them fails to
/// parse, which is the intended "surfaced before any model call" behavior
/// (spec §7: Configuration errors).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub default_model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub model_aliases: HashMap<String, String>,
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ProviderConfig {
    /// Reads and parses `path`. Unlike `OpenclawConfig::load`, a missing or
    /// malformed provider config is fatal — there is no sensible default for
    /// `api_key`/`api_base_url` (spec §7: Configuration errors surface before
    /// any model call, not silently fall back).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        check_permissions(path)?;
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read provider config {}: {e}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("failed to parse provider config {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gatecode")
            .join("provider.json")
    }

    pub fn discover() -> anyhow::Result<Self> {
        Self::load(&Self::default_path())
    }

    /// Resolves a model name through `model_aliases` if one is registered,
    /// otherwise returns the name unchanged.
    pub fn resolve_model(&self, model: &str) -> String {
        self.model_aliases.get(model).cloned().unwrap_or_else(|| model.to_string())
    }
}

/// Spec §6.1: "File permissions must exclude group/other bits; permission
/// violations are surfaced by a `doctor` probe." This is that probe, run
/// automatically before a config file is trusted rather than only on-demand.
#[cfg(unix)]
fn check_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let Ok(metadata) = std::fs::metadata(path) else {
        return Ok(());
    };
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        anyhow::bail!(
            "provider config {} is readable by group/other (mode {:o}); run `gatecode doctor` or `chmod 600` it",
            path.display(),
            mode & 0o777
        );
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

/// `gatecode doctor`: reports whether the provider config exists, parses, and
/// carries safe file permissions, without failing the process.
pub struct DoctorReport {
    pub path: PathBuf,
    pub exists: bool,
    pub permissions_ok: bool,
    pub parses: bool,
    pub detail: Option<String>,
}

pub fn doctor(path: &Path) -> DoctorReport {
    let exists = path.exists();
    if !exists {
        return DoctorReport {
            path: path.to_path_buf(),
            exists,
            permissions_ok: true,
            parses: false,
            detail: Some("no provider config found at this path".to_string()),
        };
    }

    let permissions_ok = check_permissions(path).is_ok();
    match ProviderConfig::load(path) {
        Ok(_) => DoctorReport {
            path: path.to_path_buf(),
            exists,
            permissions_ok,
            parses: true,
            detail: None,
        },
        Err(e) => DoctorReport {
            path: path.to_path_buf(),
            exists,
            permissions_ok,
            parses: false,
            detail: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("provider.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        }
        path
    }

    #[test]
    fn loads_minimal_config_with_defaults_filled_in() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"api_base_url":"https://gw.example.com/v1","api_key":"sk-x","default_model":"gpt-4o"}"#,
        );
        let config = ProviderConfig::load(&path).unwrap();
        assert_eq!(config.timeout_ms, 600_000);
        assert!(config.model_aliases.is_empty());
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn missing_required_field_fails_to_parse() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"api_base_url":"https://gw.example.com/v1"}"#);
        assert!(ProviderConfig::load(&path).is_err());
    }

    #[test]
    fn resolve_model_falls_through_aliases() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"api_base_url":"https://gw.example.com/v1","api_key":"sk-x","default_model":"gpt-4o","model_aliases":{"fast":"gpt-4o-mini"}}"#,
        );
        let config = ProviderConfig::load(&path).unwrap();
        assert_eq!(config.resolve_model("fast"), "gpt-4o-mini");
        assert_eq!(config.resolve_model("gpt-4o"), "gpt-4o");
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_config_fails_the_permission_check() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"api_base_url":"https://gw.example.com/v1","api_key":"sk-x","default_model":"gpt-4o"}"#,
        );
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(ProviderConfig::load(&path).is_err());
        let report = doctor(&path);
        assert!(!report.permissions_ok);
    }

    #[test]
    fn doctor_reports_missing_file_without_erroring() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = doctor(&dir.path().join("nope.json"));
        assert!(!report.exists);
        assert!(!report.parses);
    }
}
