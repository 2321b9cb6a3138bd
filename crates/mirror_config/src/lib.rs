//! Configuration for SiteMirror
//!
//! Rules are made of an [`OriginSpec`] and a [`DestinationSpec`], both built
//! through validating builders. Process-level options live in
//! [`SyncSettings`]. Everything except predicate selectors and post-sync
//! hooks can also be declared in TOML and parsed with [`MirrorConfig`].

pub mod destination;
pub mod origin;
pub mod selector;

pub use destination::{
    DestinationSettings, DestinationSpec, DestinationSpecBuilder, HookContext, PostSyncHook,
};
pub use origin::{OriginSettings, OriginSpec, OriginSpecBuilder};
pub use selector::TenantSelector;

use mirror_common::{FileCopyMode, Result, SyncError, TenantId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do when one destination tenant fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationErrorPolicy {
    /// Attempt every destination, then report all failures together
    #[default]
    Continue,

    /// Stop at the first failing destination
    Abort,
}

/// Process-level sync settings ([sync])
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// How attachment payloads are duplicated
    #[serde(default)]
    pub file_copy: FileCopyMode,

    #[serde(default)]
    pub on_destination_error: DestinationErrorPolicy,
}

impl SyncSettings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::ConfigError(format!("Failed to parse settings: {}", e)))
    }

    pub fn from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::ConfigError(format!("Failed to read settings: {}", e)))?;
        Self::from_toml_str(&content)
    }
}

/// One declared rule ([[rule]])
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSettings {
    /// Tenant the rule is installed in
    pub home_tenant: TenantId,

    #[serde(default)]
    pub origin: OriginSettings,

    #[serde(default)]
    pub destination: DestinationSettings,
}

impl RuleSettings {
    /// Validate into the specs a rule is built from
    pub fn into_specs(self) -> Result<(TenantId, OriginSpec, DestinationSpec)> {
        let origin = OriginSpec::try_from(self.origin)?;
        let destination = DestinationSpec::try_from(self.destination)?;
        Ok((self.home_tenant, origin, destination))
    }
}

/// A complete declarative configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleSettings>,
}

impl MirrorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    pub fn from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::ConfigError(format!("Failed to read config: {}", e)))?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    const SAMPLE: &str = r#"
[sync]
file_copy = "hard_link"
on_destination_error = "abort"

[[rule]]
home_tenant = 1

[rule.origin]
record_types = ["post"]
required_terms = { category = ["news"] }

[rule.destination]
tenants = [2, 3]
type_mapping = { post = "article" }
add_metadata = { color = ["red"] }
remove_metadata = ["internal_note"]
new_record_status = "draft"
"#;

    #[test]
    fn test_settings_defaults() {
        let settings = SyncSettings::from_toml_str("").unwrap();
        assert_eq!(settings.file_copy, FileCopyMode::Copy);
        assert_eq!(settings.on_destination_error, DestinationErrorPolicy::Continue);
    }

    #[test]
    fn test_parse_full_config() {
        let config = MirrorConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.sync.file_copy, FileCopyMode::HardLink);
        assert_eq!(config.sync.on_destination_error, DestinationErrorPolicy::Abort);
        assert_eq!(config.rules.len(), 1);

        let (home, origin, destination) = config.rules[0].clone().into_specs().unwrap();
        assert_eq!(home, TenantId(1));
        assert!(origin.required_terms()["category"].contains("news"));
        assert_eq!(destination.map_type("post"), "article");
        assert_eq!(destination.new_record_status(), "draft");
        assert!(destination.remove_metadata().contains("internal_note"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let content = "[[rule]]\nhome_tenant = 1\n[rule.origin]\npost_types = [\"post\"]\n";
        assert!(matches!(
            MirrorConfig::from_toml_str(content),
            Err(SyncError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("mirror.toml");
        file.write_str(SAMPLE).unwrap();

        let config = MirrorConfig::from_toml(file.path()).unwrap();
        assert_eq!(config.rules[0].home_tenant, TenantId(1));

        let missing = MirrorConfig::from_toml(&temp.path().join("missing.toml"));
        assert!(matches!(missing, Err(SyncError::ConfigError(_))));
    }

    #[test]
    fn test_load_settings_from_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("sync.toml");
        file.write_str("file_copy = \"hard_link\"\n").unwrap();

        let settings = SyncSettings::from_toml(file.path()).unwrap();
        assert_eq!(settings.file_copy, FileCopyMode::HardLink);
        assert_eq!(settings.on_destination_error, DestinationErrorPolicy::Continue);

        let missing = SyncSettings::from_toml(&temp.path().join("missing.toml"));
        assert!(matches!(missing, Err(SyncError::ConfigError(_))));

        let broken = temp.child("broken.toml");
        broken.write_str("on_destination_error = \"retry\"\n").unwrap();
        assert!(matches!(
            SyncSettings::from_toml(broken.path()),
            Err(SyncError::ConfigError(_))
        ));
    }
}
