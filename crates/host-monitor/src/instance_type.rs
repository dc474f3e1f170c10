//! Cloud instance type detection.

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use tracing::info;
use tracing::warn;

/// Instance type used when nothing better is known.
pub const DEFAULT_INSTANCE_TYPE: &str = "custom";

const PROVIDER_SCRIPT_PREFIX: &str = "instance_type_provider_";

/// Cloud providers with a bundled instance-type lookup script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Google,
    Microsoft,
    Xen,
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 3] = [
        CloudProvider::Google,
        CloudProvider::Microsoft,
        CloudProvider::Xen,
    ];

    /// Provider type as reported by the platform, case-insensitive.
    pub fn from_provider_type(provider_type: &str) -> Option<Self> {
        match provider_type.trim().to_ascii_lowercase().as_str() {
            "google" => Some(CloudProvider::Google),
            "microsoft" => Some(CloudProvider::Microsoft),
            "xen" => Some(CloudProvider::Xen),
            _ => None,
        }
    }

    fn script_suffix(self) -> &'static str {
        match self {
            CloudProvider::Google => "gce",
            CloudProvider::Microsoft => "azure",
            CloudProvider::Xen => "ec2",
        }
    }

    /// Lookup script for this provider under `config_dir`.
    pub fn script_path(self, config_dir: &Path) -> PathBuf {
        config_dir.join(format!("{PROVIDER_SCRIPT_PREFIX}{}", self.script_suffix()))
    }
}

/// Inputs for [`detect_instance_type`].
#[derive(Debug, Clone, Default)]
pub struct InstanceTypeConfig {
    pub config_dir: PathBuf,
    pub provider_type: Option<String>,
    pub instance_type_script: Option<PathBuf>,
}

/// Resolves the host's instance type.
///
/// A known provider's script wins, then the custom script, then
/// [`DEFAULT_INSTANCE_TYPE`]. A failing script also yields the default.
pub fn detect_instance_type(config: &InstanceTypeConfig) -> String {
    let provider = config
        .provider_type
        .as_deref()
        .and_then(CloudProvider::from_provider_type);
    info!(provider_type = ?config.provider_type, ?provider, "Detecting instance type");

    let script = provider
        .map(|p| p.script_path(&config.config_dir))
        .or_else(|| config.instance_type_script.clone());

    let instance_type = match script {
        Some(script) => instance_type_from_script(&script)
            .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()),
        None => DEFAULT_INSTANCE_TYPE.to_string(),
    };
    info!(%instance_type, "Instance type resolved");
    instance_type
}

fn instance_type_from_script(script: &Path) -> Option<String> {
    let output = match Command::new(script).output() {
        Ok(output) => output,
        Err(e) => {
            warn!(script = %script.display(), error = %e, "Failed to run instance type script");
            return None;
        }
    };
    if !output.status.success() {
        warn!(script = %script.display(), status = %output.status, "Instance type script failed");
        return None;
    }
    let instance_type = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if instance_type.is_empty() {
        return None;
    }
    info!(script = %script.display(), %instance_type, "Read instance type from script");
    Some(instance_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("should write script");
        let mut perms = std::fs::metadata(&path).expect("should stat script").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("should chmod script");
        path
    }

    #[test]
    fn provider_table_maps_to_scripts() {
        let dir = Path::new("/etc/ambari-metrics-monitor/conf");
        assert_eq!(
            CloudProvider::Google.script_path(dir),
            dir.join("instance_type_provider_gce")
        );
        assert_eq!(
            CloudProvider::from_provider_type("Microsoft"),
            Some(CloudProvider::Microsoft)
        );
        assert_eq!(CloudProvider::from_provider_type("openstack"), None);
        assert_eq!(CloudProvider::ALL.len(), 3);
    }

    #[test]
    fn defaults_without_any_script() {
        let config = InstanceTypeConfig::default();
        assert_eq!(detect_instance_type(&config), DEFAULT_INSTANCE_TYPE);
    }

    #[cfg(unix)]
    #[test]
    fn provider_script_wins_over_custom_script() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        write_script(dir.path(), "instance_type_provider_ec2", "echo m5.large");
        let custom = write_script(dir.path(), "custom.sh", "echo from-custom");

        let config = InstanceTypeConfig {
            config_dir: dir.path().to_path_buf(),
            provider_type: Some("xen".to_string()),
            instance_type_script: Some(custom),
        };

        assert_eq!(detect_instance_type(&config), "m5.large");
    }

    #[cfg(unix)]
    #[test]
    fn failing_or_empty_script_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let failing = write_script(dir.path(), "failing.sh", "echo oops; exit 1");
        let empty = write_script(dir.path(), "empty.sh", "echo '   '");

        for script in [failing, empty] {
            let config = InstanceTypeConfig {
                instance_type_script: Some(script),
                ..Default::default()
            };
            assert_eq!(detect_instance_type(&config), DEFAULT_INSTANCE_TYPE);
        }
    }
}
