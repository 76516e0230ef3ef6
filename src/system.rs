//! Measurement system: sensor registry, packet routing and system-wide
//! operations
//!
//! A [`MeasurementSystem`] owns the sensors of one installation, the
//! shared [`SampleStore`] their histories live in, the converter engine
//! for display-value scripts, and optionally the zero-adjustment audit
//! log. It routes incoming radio packets to sensors by their network
//! address and offers the system-wide operations: periodic processing,
//! aggregated current values and the all-sensor zero adjustment.
//!
//! # Address routing
//!
//! Each sensor is reachable under a two-byte key `[group, node]`. The
//! routing map is built once when the system is initialized; packets
//! carry the key at a fixed offset. Packets from addresses the map does
//! not know are counted per address and logged, never dropped silently.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::convert::ConverterEngine;
use crate::error::{LoadMonError, Result};
use crate::sensor::Sensor;
use crate::store::{SampleStore, SharedSampleStore, DEFAULT_DEPTH};
use crate::zeromon::ZeroMonitor;

/// Highest allowed system index
pub const MAX_SYSTEMS: usize = 99;

/// Byte offset of the two-byte sender address inside a radio packet
pub const PACKET_ADDR_OFFSET: usize = 11;

/// Two-byte network address key: `[group, node]`
pub type AddrKey = [u8; 2];

/// One measurement installation: sensors, shared storage and system-wide
/// operations
#[derive(Debug)]
pub struct MeasurementSystem {
    /// Index of this system within the site (0-based, at most
    /// [`MAX_SYSTEMS`])
    sysindex: usize,
    /// Display name of the installation
    name: String,
    /// All sensors of this system, in registration order
    sensors: Vec<Sensor>,
    /// Address routing map, built once by `init`
    addr_map: HashMap<AddrKey, usize>,
    /// Packet counts from addresses the routing map does not know
    unknown_sources: HashMap<AddrKey, u64>,
    /// Shared history storage for all sensors
    store: SharedSampleStore,
    /// Script engine for channel display converters
    converter: ConverterEngine,
    /// Zero-adjustment audit log; `None` disables auditing
    zeromon: Option<ZeroMonitor>,
    /// Whether `init` has run
    initialized: bool,
}

impl MeasurementSystem {
    /// Create an empty system with the default history depth
    pub fn new(sysindex: usize, name: impl Into<String>) -> Result<Self> {
        Self::with_depth(sysindex, name, DEFAULT_DEPTH)
    }

    /// Create an empty system with an explicit history depth
    pub fn with_depth(sysindex: usize, name: impl Into<String>, depth: usize) -> Result<Self> {
        if sysindex > MAX_SYSTEMS {
            return Err(LoadMonError::Config(format!(
                "system index {sysindex} exceeds the maximum of {MAX_SYSTEMS}"
            )));
        }
        Ok(Self {
            sysindex,
            name: name.into(),
            sensors: Vec::new(),
            addr_map: HashMap::new(),
            unknown_sources: HashMap::new(),
            store: SampleStore::shared(depth),
            converter: ConverterEngine::new(),
            zeromon: None,
            initialized: false,
        })
    }

    /// Attach the zero-adjustment audit log, writing into `dir`
    pub fn with_zero_monitor(mut self, dir: impl AsRef<std::path::Path>) -> Result<Self> {
        self.zeromon = Some(ZeroMonitor::new(dir)?);
        Ok(self)
    }

    /// System index
    pub fn sysindex(&self) -> usize {
        self.sysindex
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the history storage
    pub fn store(&self) -> SharedSampleStore {
        self.store.clone()
    }

    /// All sensors, in registration order
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Mutable access to the sensors
    pub fn sensors_mut(&mut self) -> &mut [Sensor] {
        &mut self.sensors
    }

    /// Add a sensor to the system. Only allowed before `init`; the column
    /// layout is fixed once the routing map exists.
    pub fn add_sensor(&mut self, sensor: Sensor) -> Result<usize> {
        if self.initialized {
            return Err(LoadMonError::Config(
                "sensors cannot be added after system initialization".into(),
            ));
        }
        self.sensors.push(sensor);
        Ok(self.sensors.len() - 1)
    }

    /// Initialize the system: assign every sensor its columns in the
    /// shared store, hand out the store handle, and build the address
    /// routing map. Must run exactly once, after all sensors are added.
    ///
    /// A sensor without a node address is mapped under node 0 and logged;
    /// partially configured hardware stays reachable for commissioning.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Err(LoadMonError::Config(
                "system is already initialized".into(),
            ));
        }

        {
            let mut store = match self.store.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for sensor in &mut self.sensors {
                sensor.assign_columns(&mut store)?;
            }
        }

        for (idx, sensor) in self.sensors.iter_mut().enumerate() {
            sensor.register(self.store.clone());

            let (group, node) = sensor.addr();
            let node = match node {
                Some(node) => node,
                None => {
                    warn!(
                        sensor = %sensor.label(),
                        "no node address configured, mapping under node 0"
                    );
                    0
                }
            };
            let key = [group, node];
            if let Some(&other) = self.addr_map.get(&key) {
                return Err(LoadMonError::Config(format!(
                    "address {key:02x?} is claimed by both sensor {other} and sensor {idx}"
                )));
            }
            self.addr_map.insert(key, idx);
        }

        self.initialized = true;
        info!(
            system = %self.name,
            sensors = self.sensors.len(),
            "measurement system initialized"
        );
        Ok(())
    }

    /// Look up a sensor index by its two-byte network address
    pub fn sensor_by_addr(&self, key: AddrKey) -> Option<usize> {
        self.addr_map.get(&key).copied()
    }

    /// Extract the sender address from a radio packet and resolve it to a
    /// sensor index. Unknown addresses are counted and logged, short
    /// packets rejected with `None`.
    pub fn sensor_by_packet(&mut self, packet: &[u8]) -> Option<usize> {
        let key = packet_addr(packet)?;
        match self.addr_map.get(&key) {
            Some(&idx) => {
                if let Some(sensor) = self.sensors.get_mut(idx) {
                    sensor.observe_rx(packet);
                }
                Some(idx)
            }
            None => {
                let count = self.unknown_sources.entry(key).or_insert(0);
                *count += 1;
                debug!(
                    addr = ?key,
                    count = *count,
                    "packet from unknown sender address"
                );
                None
            }
        }
    }

    /// Packet counts per unknown sender address seen so far
    pub fn unknown_sources(&self) -> &HashMap<AddrKey, u64> {
        &self.unknown_sources
    }

    /// Feed a new row of raw values to the sensor at the given address
    pub fn update_sensor(&mut self, key: AddrKey, raw: &[f64]) -> Result<()> {
        let idx = self
            .sensor_by_addr(key)
            .ok_or_else(|| LoadMonError::Config(format!("no sensor at address {key:02x?}")))?;
        self.sensors[idx].update(raw)
    }

    /// Periodic processing: run every sensor's staleness check
    pub fn process(&mut self) {
        for sensor in &mut self.sensors {
            sensor.process();
        }
    }

    /// Current output values of all sensors, flattened in registration
    /// order, with channel converter scripts applied. A failing converter
    /// is logged and the unconverted value used; stored data is never
    /// touched by conversion.
    pub fn current_outputs(&mut self) -> Vec<f64> {
        let converter = &mut self.converter;
        let mut out = Vec::new();
        for sensor in &self.sensors {
            let head = match sensor.current_outputs(None) {
                Some(head) => head,
                None => continue,
            };
            for (chan, &value) in sensor.chans_out.iter().zip(head.iter()) {
                let value = match &chan.converter_script {
                    Some(script) => match converter.apply(script, value) {
                        Ok(converted) => converted,
                        Err(e) => {
                            warn!(channel = %chan.name, error = %e, "converter failed, using raw value");
                            value
                        }
                    },
                    None => value,
                };
                out.push(value);
            }
        }
        out
    }

    /// Current raw input values of all sensors, flattened in registration
    /// order. Converters do not apply to inputs.
    pub fn current_inputs(&self) -> Vec<f64> {
        let mut out = Vec::new();
        for sensor in &self.sensors {
            if let Some(head) = sensor.current_inputs(None) {
                out.extend(head.iter().copied());
            }
        }
        out
    }

    /// Zero-adjust every sensor at its current reading and append one
    /// record to the audit log. An audit write failure is logged and the
    /// zero operation still succeeds; a failing sensor aborts with its
    /// error.
    pub fn zero_all(&mut self) -> Result<()> {
        let mut raw = Vec::new();
        let mut calibrated = Vec::new();
        let mut states = Vec::new();

        for sensor in &mut self.sensors {
            let (zero_out, zero_in) = sensor.zero_set(None, None)?;
            raw.extend(zero_in);
            calibrated.extend(zero_out);
            states.push(sensor.state().display_name());
        }

        if let Some(zeromon) = &mut self.zeromon {
            if let Err(e) = zeromon.record(&raw, &calibrated, &states) {
                warn!(error = %e, "zero audit log write failed");
            }
        }
        info!(system = %self.name, "all sensors zero-adjusted");
        Ok(())
    }
}

impl std::fmt::Display for MeasurementSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "SYS[{}]: {} sensors={} init={}",
            self.sysindex,
            self.name,
            self.sensors.len(),
            self.initialized,
        )?;
        for sensor in &self.sensors {
            writeln!(f, "  {sensor}")?;
        }
        Ok(())
    }
}

/// Extract the two-byte sender address from a radio packet, if the packet
/// is long enough to carry one
pub fn packet_addr(packet: &[u8]) -> Option<AddrKey> {
    let bytes = packet.get(PACKET_ADDR_OFFSET..PACKET_ADDR_OFFSET + 2)?;
    Some([bytes[0], bytes[1]])
}
