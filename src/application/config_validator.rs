//! Configuration validator
//!
//! Accumulates the `key=value` parameters nbdkit passes on the command
//! line and turns them into a [`Configuration`] once all are in.

use super::error::ConfigError;
use crate::domain::entities::{BackupTime, Configuration};

/// Help text listing every recognized parameter
pub const CONFIG_HELP: &str = "\
repo=<REPO>                  (required) The PBS repository string to connect.
password=<PASSWORD>          (required) The PBS password.
fingerprint=<FINGERPRINT>    (required) The PBS ssl fingerprint.
vmid=<VMID>                  (required) The Backup ID to map.
timestamp=<TIMESTAMP>        (required) The Backup time to map (YYYY-MM-DDTHH:MM:SSZ).
image=<IMAGE>                (required) The Backup image to map.
namespace=<NAMESPACE>        (optional) The datastore namespace of the backup.";

/// A recognized parameter name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Repo,
    Password,
    Fingerprint,
    Vmid,
    Timestamp,
    Image,
    Namespace,
}

impl ConfigKey {
    /// All keys; required ones in the order they are checked for presence
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::Image,
        ConfigKey::Timestamp,
        ConfigKey::Repo,
        ConfigKey::Password,
        ConfigKey::Fingerprint,
        ConfigKey::Vmid,
        ConfigKey::Namespace,
    ];

    /// Looks up a key by its command line name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    /// Returns the command line name
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::Repo => "repo",
            ConfigKey::Password => "password",
            ConfigKey::Fingerprint => "fingerprint",
            ConfigKey::Vmid => "vmid",
            ConfigKey::Timestamp => "timestamp",
            ConfigKey::Image => "image",
            ConfigKey::Namespace => "namespace",
        }
    }

    /// Returns whether the key must be supplied
    pub fn is_required(&self) -> bool {
        !matches!(self, ConfigKey::Namespace)
    }
}

/// Collects parameters until [`ConfigBuilder::complete`] is called
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    repo: Option<String>,
    password: Option<String>,
    fingerprint: Option<String>,
    vmid: Option<String>,
    timestamp: Option<String>,
    image: Option<String>,
    namespace: Option<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one parameter
    ///
    /// A later value for the same key replaces an earlier one.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key =
            ConfigKey::parse(key).ok_or_else(|| ConfigError::UnknownParameter(key.into()))?;

        if key.is_required() && value.is_empty() {
            return Err(ConfigError::EmptyParameter(key.name()));
        }

        *self.slot_mut(key) = Some(value.to_string());
        Ok(())
    }

    /// Returns the value recorded for `key`, if any
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        let value = match key {
            ConfigKey::Repo => &self.repo,
            ConfigKey::Password => &self.password,
            ConfigKey::Fingerprint => &self.fingerprint,
            ConfigKey::Vmid => &self.vmid,
            ConfigKey::Timestamp => &self.timestamp,
            ConfigKey::Image => &self.image,
            ConfigKey::Namespace => &self.namespace,
        };
        value.as_deref()
    }

    /// Checks that every required parameter is present and well-formed
    pub fn complete(&self) -> Result<Configuration, ConfigError> {
        let image = self.require(ConfigKey::Image)?;
        let timestamp = self.require(ConfigKey::Timestamp)?;
        let backup_time = BackupTime::parse(timestamp)
            .ok_or_else(|| ConfigError::InvalidTimestamp(timestamp.to_string()))?;
        let repository = self.require(ConfigKey::Repo)?;
        let password = self.require(ConfigKey::Password)?;
        let fingerprint = self.require(ConfigKey::Fingerprint)?;
        let vmid = self.require(ConfigKey::Vmid)?;

        Ok(Configuration {
            repository: repository.to_string(),
            password: password.to_string(),
            fingerprint: fingerprint.to_string(),
            vmid: vmid.to_string(),
            backup_time,
            image: image.to_string(),
            namespace: self
                .get(ConfigKey::Namespace)
                .filter(|ns| !ns.is_empty())
                .map(str::to_string),
        })
    }

    fn require(&self, key: ConfigKey) -> Result<&str, ConfigError> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingParameter(key.name()))
    }

    fn slot_mut(&mut self, key: ConfigKey) -> &mut Option<String> {
        match key {
            ConfigKey::Repo => &mut self.repo,
            ConfigKey::Password => &mut self.password,
            ConfigKey::Fingerprint => &mut self.fingerprint,
            ConfigKey::Vmid => &mut self.vmid,
            ConfigKey::Timestamp => &mut self.timestamp,
            ConfigKey::Image => &mut self.image,
            ConfigKey::Namespace => &mut self.namespace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_builder() -> ConfigBuilder {
        let mut builder = ConfigBuilder::new();
        for (key, value) in [
            ("repo", "root@pam@pbs:store"),
            ("password", "secret"),
            ("fingerprint", "aa:bb:cc"),
            ("vmid", "100"),
            ("timestamp", "2025-01-01T00:00:00Z"),
            ("image", "drive-scsi0.img"),
        ] {
            builder.set(key, value).unwrap();
        }
        builder
    }

    #[test]
    fn test_complete_config() {
        let config = full_builder().complete().unwrap();
        assert_eq!(config.repository, "root@pam@pbs:store");
        assert_eq!(config.backup_time.epoch(), 1_735_689_600);
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut builder = ConfigBuilder::new();
        assert_eq!(
            builder.set("keyfile", "/etc/key"),
            Err(ConfigError::UnknownParameter("keyfile".into()))
        );
    }

    #[test]
    fn test_missing_reported_in_check_order() {
        let mut builder = ConfigBuilder::new();
        builder.set("vmid", "100").unwrap();
        assert_eq!(
            builder.complete(),
            Err(ConfigError::MissingParameter("image"))
        );
    }

    #[test]
    fn test_last_value_wins() {
        let mut builder = full_builder();
        builder.set("vmid", "101").unwrap();
        assert_eq!(builder.complete().unwrap().vmid, "101");
    }

    #[test]
    fn test_empty_namespace_is_root() {
        let mut builder = full_builder();
        builder.set("namespace", "").unwrap();
        assert_eq!(builder.get(ConfigKey::Namespace), Some(""));
        assert_eq!(builder.complete().unwrap().namespace, None);
    }

    #[test]
    fn test_missing_message_names_parameter() {
        let err = ConfigError::MissingParameter("repo");
        assert_eq!(
            err.to_string(),
            "you must supply the repo=<REPO> parameter after the plugin name on the command line"
        );
    }
}
