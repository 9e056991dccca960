//! Configuration management for PadBridge GW
//!
//! Loads the bridge configuration once at startup. JSON is the default
//! format; files ending in `.yaml`/`.yml` are parsed as YAML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::error::{BridgeError, Result};

/// Highest valid MIDI control-change number
pub const MAX_CC: u8 = 127;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Routing/interaction behavior
    #[serde(default)]
    pub mode: Mode,

    /// Device whose pads are driven (port name without its index suffix)
    pub source_device_name: String,

    /// Devices that receive everything the source sends
    #[serde(default)]
    pub target_devices_names: Vec<String>,

    /// One entry per pad, in pad index order
    pub pads_config: Vec<PadConfig>,

    /// Voicemeeter parameter name -> pad cc
    #[serde(default)]
    pub vm_parameter_to_cc: BTreeMap<String, u8>,

    /// Voicemeeter macro button index -> pad cc
    #[serde(default)]
    pub vm_button_to_cc: BTreeMap<u32, u8>,

    /// Skip target devices whose ports are missing instead of aborting
    #[serde(default)]
    pub allow_missing_targets: bool,

    /// Voicemeeter Remote connection settings (used in `vm` mode)
    #[serde(default)]
    pub voicemeeter: VoicemeeterConfig,
}

/// Bridge operation mode
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pad presses on the source toggle their LEDs locally
    Switch,
    /// Pad LEDs follow Voicemeeter parameter and button state
    Vm,
    /// Plain relay, LEDs only show the configured static state
    #[default]
    #[serde(other)]
    Forward,
}

/// Static configuration of a single pad
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PadConfig {
    pub cc: u8,
    pub rgb: [u8; 3],
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub reverse: bool,
}

/// Voicemeeter Remote settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoicemeeterConfig {
    /// Expected Voicemeeter edition ("basic", "banana", "potato")
    #[serde(default = "default_vm_kind")]
    pub kind: String,

    /// Override for the VoicemeeterRemote library location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dll_path: Option<String>,

    /// How often the dirty flags are polled
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for VoicemeeterConfig {
    fn default() -> Self {
        Self {
            kind: default_vm_kind(),
            dll_path: None,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// On-disk format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension (JSON unless `.yaml`/`.yml`)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| BridgeError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;

        Self::parse(&contents, ConfigFormat::from_path(path))
    }

    /// Parse and validate configuration text
    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self> {
        let config: AppConfig = match format {
            ConfigFormat::Json => serde_json::from_str(contents)?,
            ConfigFormat::Yaml => serde_yaml::from_str(contents)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.source_device_name.trim().is_empty() {
            return Err(BridgeError::Config(
                "source_device_name cannot be empty".to_string(),
            ));
        }

        for (idx, name) in self.target_devices_names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(BridgeError::Config(format!(
                    "target_devices_names[{idx}] cannot be empty"
                )));
            }
        }

        if self.pads_config.is_empty() {
            return Err(BridgeError::Config(
                "at least one pad must be defined in pads_config".to_string(),
            ));
        }

        for (idx, pad) in self.pads_config.iter().enumerate() {
            check_cc(pad.cc, || format!("pads_config[{idx}]"))?;
        }

        for (parameter, cc) in &self.vm_parameter_to_cc {
            check_cc(*cc, || format!("vm_parameter_to_cc['{parameter}']"))?;
        }

        for (button, cc) in &self.vm_button_to_cc {
            check_cc(*cc, || format!("vm_button_to_cc[{button}]"))?;
        }

        if self.voicemeeter.poll_interval_ms == 0 {
            return Err(BridgeError::Config(
                "voicemeeter.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_cc(cc: u8, location: impl FnOnce() -> String) -> Result<()> {
    if cc > MAX_CC {
        return Err(BridgeError::Config(format!(
            "{} has invalid CC number {} (must be 0-127)",
            location(),
            cc
        )));
    }
    Ok(())
}

// Default value functions
fn default_vm_kind() -> String { "banana".to_string() }
fn default_poll_interval() -> u64 { 20 }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_JSON: &str = r#"{
        "mode": "switch",
        "source_device_name": "MPK mini 3",
        "target_devices_names": ["loopMIDI Port"],
        "pads_config": [
            { "cc": 16, "rgb": [255, 0, 0] },
            { "cc": 17, "rgb": [0, 255, 0], "static": true, "reverse": true }
        ],
        "vm_parameter_to_cc": { "Strip[0].Mute": 16 },
        "vm_button_to_cc": { "3": 17 }
    }"#;

    #[test]
    fn test_parse_json_config() {
        let config = AppConfig::parse(MINIMAL_JSON, ConfigFormat::Json).unwrap();

        assert_eq!(config.mode, Mode::Switch);
        assert_eq!(config.source_device_name, "MPK mini 3");
        assert_eq!(config.target_devices_names, vec!["loopMIDI Port"]);
        assert_eq!(config.pads_config.len(), 2);
        assert!(!config.pads_config[0].is_static);
        assert!(!config.pads_config[0].reverse);
        assert!(config.pads_config[1].is_static);
        assert!(config.pads_config[1].reverse);
        assert_eq!(config.vm_parameter_to_cc["Strip[0].Mute"], 16);
        assert_eq!(config.vm_button_to_cc[&3], 17);
        assert!(!config.allow_missing_targets);
        assert_eq!(config.voicemeeter.kind, "banana");
        assert_eq!(config.voicemeeter.poll_interval_ms, 20);
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
mode: vm
source_device_name: MPK mini 3
pads_config:
  - cc: 16
    rgb: [0, 0, 255]
vm_button_to_cc:
  0: 16
voicemeeter:
  kind: potato
  poll_interval_ms: 50
"#;
        let config = AppConfig::parse(yaml, ConfigFormat::Yaml).unwrap();

        assert_eq!(config.mode, Mode::Vm);
        assert!(config.target_devices_names.is_empty());
        assert_eq!(config.vm_button_to_cc[&0], 16);
        assert_eq!(config.voicemeeter.kind, "potato");
        assert_eq!(config.voicemeeter.poll_interval_ms, 50);
    }

    #[test]
    fn test_unknown_mode_is_forward() {
        let json = MINIMAL_JSON.replace("\"switch\"", "\"passthrough\"");
        let config = AppConfig::parse(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.mode, Mode::Forward);
    }

    #[test]
    fn test_missing_mode_is_forward() {
        let json = MINIMAL_JSON.replace("\"mode\": \"switch\",", "");
        let config = AppConfig::parse(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.mode, Mode::Forward);
    }

    #[test]
    fn test_rejects_out_of_range_cc() {
        let json = MINIMAL_JSON.replace("\"cc\": 16", "\"cc\": 200");
        let err = AppConfig::parse(&json, ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, BridgeError::Config(msg) if msg.contains("pads_config[0]")));

        let json = MINIMAL_JSON.replace("\"Strip[0].Mute\": 16", "\"Strip[0].Mute\": 128");
        let err = AppConfig::parse(&json, ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, BridgeError::Config(msg) if msg.contains("Strip[0].Mute")));
    }

    #[test]
    fn test_rejects_empty_pads_and_source() {
        let json = r#"{ "source_device_name": "MPK", "pads_config": [] }"#;
        assert!(AppConfig::parse(json, ConfigFormat::Json).is_err());

        let json = r#"{ "source_device_name": " ", "pads_config": [{ "cc": 1, "rgb": [0,0,0] }] }"#;
        assert!(AppConfig::parse(json, ConfigFormat::Json).is_err());
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let json = r#"{
            "source_device_name": "MPK",
            "pads_config": [{ "cc": 1, "rgb": [0,0,0] }],
            "voicemeeter": { "poll_interval_ms": 0 }
        }"#;
        assert!(AppConfig::parse(json, ConfigFormat::Json).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("config.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config.YAML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("config.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(MINIMAL_JSON.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).await.unwrap();
        assert_eq!(config.pads_config[0].cc, 16);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/padbridge.json").await.unwrap_err();
        assert!(matches!(err, BridgeError::ConfigRead { .. }));
    }
}
