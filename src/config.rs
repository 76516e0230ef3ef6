//! TOML configuration for a measurement system
//!
//! A system is described declaratively: one `[system]` section plus one
//! `[[sensor]]` table per device. [`SystemConfig::build`] turns the
//! parsed description into an initialized
//! [`MeasurementSystem`](crate::system::MeasurementSystem).
//!
//! ```toml
//! [system]
//! index = 0
//! name = "Crane 1"
//!
//! [[sensor]]
//! type = "rkm-w2-ch"
//! node = 3
//! name = "F1"
//! calibration = { kind = "scaled-sum", factor = 10.0 }
//! ```
//!
//! Unknown sensor types or calibration kinds fail parsing outright; a
//! misspelled device type must never silently become a default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LoadMonError, Result, ResultExt};
use crate::sensor::{Calibration, Sensor, SensorInfo, SensorType};
use crate::store::DEFAULT_DEPTH;
use crate::system::MeasurementSystem;

/// Top-level configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// The `[system]` section
    pub system: SystemSection,
    /// The `[[sensor]]` tables, in column-assignment order
    #[serde(default, rename = "sensor")]
    pub sensors: Vec<SensorSection>,
}

/// The `[system]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SystemSection {
    /// System index within the site
    pub index: usize,
    /// Display name of the installation
    pub name: String,
    /// History depth in samples
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// Directory for the zero-adjustment audit log; omit to disable
    #[serde(default)]
    pub zeromon_dir: Option<PathBuf>,
}

/// One `[[sensor]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SensorSection {
    /// Device type, e.g. "rkm-w2-ch"
    #[serde(rename = "type")]
    pub devtype: SensorType,
    /// Network node address; omit for partially configured hardware
    #[serde(default)]
    pub node: Option<u8>,
    /// Application nick name
    #[serde(default)]
    pub name: String,
    /// Customer-facing device name
    #[serde(default)]
    pub name_customer: String,
    /// Manufacturer serial number
    #[serde(default)]
    pub serial: String,
    /// Customer serial number
    #[serde(default)]
    pub serial_customer: String,
    /// Calibration date, e.g. "20230101"
    #[serde(default)]
    pub calibration_date: String,
    /// Calibration strategy; defaults to no calibration
    #[serde(default)]
    pub calibration: Calibration,
    /// Staleness timeout override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Per-output-channel display overrides
    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelSection>,
}

/// One `[[sensor.channel]]` table overriding output channel display
/// metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChannelSection {
    /// Output channel index within the sensor
    pub index: usize,
    /// Application-facing channel name
    #[serde(default)]
    pub name: Option<String>,
    /// Customer-facing channel name
    #[serde(default)]
    pub name_customer: Option<String>,
    /// Unit label
    #[serde(default)]
    pub unit: Option<String>,
    /// Rhai converter script applied at query time
    #[serde(default)]
    pub converter: Option<String>,
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}

impl SystemConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Write the configuration back out as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| LoadMonError::Config(format!("serializing configuration: {e}")))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Build and initialize a measurement system from this configuration
    pub fn build(&self) -> Result<MeasurementSystem> {
        let mut system =
            MeasurementSystem::with_depth(self.system.index, &self.system.name, self.system.depth)?;
        if let Some(dir) = &self.system.zeromon_dir {
            system = system.with_zero_monitor(dir)?;
        }

        for section in &self.sensors {
            let mut sensor = Sensor::new(section.devtype, section.calibration).with_info(
                SensorInfo {
                    name: section.name.clone(),
                    name_customer: section.name_customer.clone(),
                    serial: section.serial.clone(),
                    serial_customer: section.serial_customer.clone(),
                    calibration_date: section.calibration_date.clone(),
                },
            );
            if let Some(node) = section.node {
                sensor = sensor.with_node_addr(node);
            }
            if let Some(secs) = section.timeout_secs {
                sensor = sensor.with_timeout(Duration::from_secs(secs));
            }

            for chan in &section.channels {
                let target = sensor.chans_out.get_mut(chan.index).ok_or_else(|| {
                    LoadMonError::Config(format!(
                        "sensor {} has no output channel {}",
                        section.name, chan.index
                    ))
                })?;
                if let Some(name) = &chan.name {
                    target.name = name.clone();
                }
                if let Some(name) = &chan.name_customer {
                    target.name_customer = name.clone();
                }
                if let Some(unit) = &chan.unit {
                    target.unit = unit.clone();
                }
                if let Some(script) = &chan.converter {
                    target.converter_script = Some(script.clone());
                }
            }

            system.add_sensor(sensor)?;
        }

        system.init()?;
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [system]
        index = 1
        name = "Crane 1"

        [[sensor]]
        type = "rkm-w2-ch"
        node = 3
        name = "F1"
        serial = "123456.01"
        calibration = { kind = "scaled-sum", factor = 10.0 }

        [[sensor.channel]]
        index = 0
        name = "F Rad"
        unit = "kN"
        converter = "value * 0.001"

        [[sensor]]
        type = "pint-w-ch1"
        node = 7
        name = "P1"
        timeout-secs = 60
    "#;

    #[test]
    fn test_parse_example() {
        let config = SystemConfig::from_toml(EXAMPLE).unwrap();
        assert_eq!(config.system.index, 1);
        assert_eq!(config.system.depth, DEFAULT_DEPTH);
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.sensors[0].devtype, SensorType::RkmW2Ch);
        assert_eq!(
            config.sensors[0].calibration,
            Calibration::ScaledSum { factor: 10.0 }
        );
        assert_eq!(config.sensors[1].timeout_secs, Some(60));
    }

    #[test]
    fn test_unknown_sensor_type_fails() {
        let bad = r#"
            [system]
            index = 0
            name = "bad"

            [[sensor]]
            type = "frobnicator-9000"
        "#;
        assert!(matches!(
            SystemConfig::from_toml(bad).unwrap_err(),
            LoadMonError::ConfigParse(_)
        ));
    }

    #[test]
    fn test_unknown_calibration_kind_fails() {
        let bad = r#"
            [system]
            index = 0
            name = "bad"

            [[sensor]]
            type = "pint-w-ch1"
            calibration = { kind = "magic" }
        "#;
        assert!(SystemConfig::from_toml(bad).is_err());
    }

    #[test]
    fn test_build_initialized_system() {
        let config = SystemConfig::from_toml(EXAMPLE).unwrap();
        let system = config.build().unwrap();

        assert_eq!(system.sensor_by_addr([1, 3]), Some(0));
        assert_eq!(system.sensor_by_addr([4, 7]), Some(1));

        let sensor = &system.sensors()[0];
        assert_eq!(sensor.info.name, "F1");
        assert_eq!(sensor.chans_out[0].name, "F Rad");
        assert_eq!(sensor.chans_out[0].unit, "kN");
        assert_eq!(
            sensor.chans_out[0].converter_script.as_deref(),
            Some("value * 0.001")
        );
    }

    #[test]
    fn test_channel_override_out_of_range() {
        let bad = r#"
            [system]
            index = 0
            name = "bad channel"

            [[sensor]]
            type = "pint-w-ch1"
            name = "P1"

            [[sensor.channel]]
            index = 5
            unit = "bar"
        "#;
        let config = SystemConfig::from_toml(bad).unwrap();
        assert!(matches!(
            config.build().unwrap_err(),
            LoadMonError::Config(_)
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let config = SystemConfig::from_toml(EXAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.toml");

        config.save(&path).unwrap();
        let reloaded = SystemConfig::load(&path).unwrap();
        assert_eq!(reloaded.system.name, config.system.name);
        assert_eq!(reloaded.sensors.len(), config.sensors.len());
        assert_eq!(reloaded.sensors[0].devtype, config.sensors[0].devtype);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            SystemConfig::load("/nonexistent/system.toml").unwrap_err(),
            LoadMonError::Io(_)
        ));
    }
}
