//! Sensor abstraction: device types, operating state, calibration and
//! zero correction
//!
//! A [`Sensor`] models one physical measurement device with a fixed set of
//! raw input channels and calibrated output channels; the counts are
//! determined by the [`SensorType`]. The sensor does not own its history
//! storage — it holds column indices into the system-wide
//! [`SampleStore`](crate::store::SampleStore) and a shared handle to it.
//!
//! # Data path
//!
//! Each [`Sensor::update`] call treats the incoming values as a new row:
//! the sensor's input columns roll down one step (row 0 = newest), the
//! calibration function recomputes the output row from the new input row,
//! and the zero offsets are subtracted from the shown output row. Zero
//! correction is re-applied on every update regardless of whether
//! calibration ran.
//!
//! # State machine
//!
//! Sensors start in `Init` and are moved between operating states by the
//! external command layer. Every [`Sensor::process`] call checks the
//! staleness of the last reception and drops the sensor into
//! `ErrorTimeout` once nothing has been heard for the configured timeout.
//! `Init` is exempt: a sensor that has never reported is not yet lost.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::MutexGuard;
use std::time::{Duration, Instant};

use crate::channel::Channel;
use crate::error::{LoadMonError, Result};
use crate::store::{SampleStore, SharedSampleStore};

/// Staleness threshold after which a silent sensor is flagged lost
pub const DEFAULT_SENSOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the per-sensor ring of recently received raw messages
pub const RX_RING_CAPACITY: usize = 10;

/// Supported sensor device types.
///
/// Each type fixes the number of raw input and calibrated output channels
/// and the network group address the device family uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorType {
    /// Brake force sensor, wireless; only CH0 carries valid data
    BkmW1Ch0,
    /// Brake force sensor, wireless; only CH1 carries valid data
    BkmW1Ch1,
    /// Brake force sensor, wireless; both channels summed into one output
    BkmW2ChSum,
    /// Brake force sensor, wireless; both channels calibrated independently
    BkmW2ChDual,
    /// Wheel load sensor, wireless, two channels into one output
    RkmW2Ch,
    /// Pressure interface, wireless, single channel
    PintWCh1,
    /// Pressure interface, wireless, two channels
    PintWCh2,
    /// Pressure interface, wireless, four channels
    PintWCh4,
    /// Pressure interface, wireless, eight channels
    PintWCh8,
}

impl SensorType {
    /// Number of raw input channels for this device type
    pub fn input_channels(&self) -> usize {
        match self {
            SensorType::BkmW1Ch0 | SensorType::BkmW1Ch1 | SensorType::PintWCh1 => 1,
            SensorType::BkmW2ChSum
            | SensorType::BkmW2ChDual
            | SensorType::RkmW2Ch
            | SensorType::PintWCh2 => 2,
            SensorType::PintWCh4 => 4,
            SensorType::PintWCh8 => 8,
        }
    }

    /// Number of calibrated output channels for this device type
    pub fn output_channels(&self) -> usize {
        match self {
            SensorType::BkmW1Ch0
            | SensorType::BkmW1Ch1
            | SensorType::BkmW2ChSum
            | SensorType::RkmW2Ch
            | SensorType::PintWCh1 => 1,
            SensorType::BkmW2ChDual | SensorType::PintWCh2 => 2,
            SensorType::PintWCh4 => 4,
            SensorType::PintWCh8 => 8,
        }
    }

    /// Network group address used by this device family
    pub fn group_addr(&self) -> u8 {
        match self {
            SensorType::BkmW1Ch0
            | SensorType::BkmW1Ch1
            | SensorType::BkmW2ChSum
            | SensorType::BkmW2ChDual
            | SensorType::RkmW2Ch => 1,
            SensorType::PintWCh1
            | SensorType::PintWCh2
            | SensorType::PintWCh4
            | SensorType::PintWCh8 => 4,
        }
    }

    /// All supported device types
    pub fn all() -> &'static [SensorType] {
        &[
            SensorType::BkmW1Ch0,
            SensorType::BkmW1Ch1,
            SensorType::BkmW2ChSum,
            SensorType::BkmW2ChDual,
            SensorType::RkmW2Ch,
            SensorType::PintWCh1,
            SensorType::PintWCh2,
            SensorType::PintWCh4,
            SensorType::PintWCh8,
        ]
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Operating state of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorState {
    /// Initial state after system start; exempt from timeout checking
    #[default]
    Init,
    /// Configured but not in use; data is not updated
    Inactive,
    /// Device idle, reachable
    Idle,
    /// Device actively measuring
    Measure,
    /// Device charging
    Charge,
    /// Device in calibration mode
    Calib,
    /// General error of unknown reason; sink until reset
    Error,
    /// Nothing heard from the device for longer than the timeout
    ErrorTimeout,
}

impl SensorState {
    /// Check if this is one of the error states
    pub fn is_error(&self) -> bool {
        matches!(self, SensorState::Error | SensorState::ErrorTimeout)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            SensorState::Init => "Init",
            SensorState::Inactive => "Inactive",
            SensorState::Idle => "Idle",
            SensorState::Measure => "Measure",
            SensorState::Charge => "Charge",
            SensorState::Calib => "Calibration",
            SensorState::Error => "Error",
            SensorState::ErrorTimeout => "Timeout",
        }
    }
}

/// Calibration strategy mapping the current raw input row to the output
/// row. The closed set keeps dispatch explicit; production curves are
/// added as new variants with the same row-in/row-out signature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Calibration {
    /// No calibration configured; outputs carry the plain input sum
    #[default]
    NoCalibration,
    /// Sum of inputs, each scaled by a constant factor
    ScaledSum { factor: f64 },
    /// Plain sum of inputs
    PlainSum,
}

impl Calibration {
    /// Apply the calibration to the current input row, producing one value
    /// per output channel. The summed result is broadcast across all
    /// output channels.
    pub fn apply(&self, inputs: &[f64], output_len: usize) -> Vec<f64> {
        let sum: f64 = match self {
            Calibration::NoCalibration | Calibration::PlainSum => inputs.iter().sum(),
            Calibration::ScaledSum { factor } => inputs.iter().map(|v| v * factor).sum(),
        };
        vec![sum; output_len]
    }
}

/// Organizational identity fields of a sensor, shown in displays and
/// carried into reports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Application nick name, e.g. "F1" or "PMULT4"
    pub name: String,
    /// Name the customer uses for the device, e.g. "Sensor 1"
    pub name_customer: String,
    /// Manufacturer serial number, e.g. "123456.01"
    pub serial: String,
    /// Customer serial number, e.g. "K-9854"
    pub serial_customer: String,
    /// Calibration date, e.g. "20230101"
    pub calibration_date: String,
}

/// One measurement device with raw input and calibrated output channels
#[derive(Debug)]
pub struct Sensor {
    /// Device type; fixes the channel layout
    devtype: SensorType,
    /// Identity fields for display and reporting
    pub info: SensorInfo,
    /// Network group address (from the device type)
    addr_group: u8,
    /// Network node address; `None` for partially configured hardware
    addr_node: Option<u8>,
    /// Raw input channels, in wire order
    pub chans_in: Vec<Channel>,
    /// Calibrated output channels
    pub chans_out: Vec<Channel>,
    /// Column indices of this sensor's input channels in the shared store
    cols_in: Vec<usize>,
    /// Column indices of this sensor's output channels
    cols_out: Vec<usize>,
    /// Shared handle to the system's sample store, set by `register`
    store: Option<SharedSampleStore>,
    /// Zero offsets for raw inputs, one per input channel
    zero_in: Vec<f64>,
    /// Zero offsets for calibrated outputs, one per output channel
    zero_out: Vec<f64>,
    /// Calibration strategy selected at construction
    calibration: Calibration,
    /// Current operating state
    state: SensorState,
    /// Last time a message from the device was seen
    last_rx: Instant,
    /// Ring of recently received raw messages for duplicate detection
    rx_ring: VecDeque<Vec<u8>>,
    /// Staleness threshold for the timeout check
    timeout: Duration,
}

impl Sensor {
    /// Create a sensor of the given device type. The channel layout and
    /// group address come from the type table; zero vectors are allocated
    /// at full length immediately.
    pub fn new(devtype: SensorType, calibration: Calibration) -> Self {
        let n_in = devtype.input_channels();
        let n_out = devtype.output_channels();
        Self {
            devtype,
            info: SensorInfo::default(),
            addr_group: devtype.group_addr(),
            addr_node: None,
            chans_in: (0..n_in).map(Channel::new).collect(),
            chans_out: (0..n_out).map(Channel::new).collect(),
            cols_in: Vec::new(),
            cols_out: Vec::new(),
            store: None,
            zero_in: vec![0.0; n_in],
            zero_out: vec![0.0; n_out],
            calibration,
            state: SensorState::Init,
            last_rx: Instant::now(),
            rx_ring: VecDeque::with_capacity(RX_RING_CAPACITY),
            timeout: DEFAULT_SENSOR_TIMEOUT,
        }
    }

    /// Set the network node address
    pub fn with_node_addr(mut self, node: u8) -> Self {
        self.addr_node = Some(node);
        self
    }

    /// Set the identity fields
    pub fn with_info(mut self, info: SensorInfo) -> Self {
        self.info = info;
        self
    }

    /// Override the staleness timeout (default 30 s)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Device type of this sensor
    pub fn devtype(&self) -> SensorType {
        self.devtype
    }

    /// Network address as (group, node)
    pub fn addr(&self) -> (u8, Option<u8>) {
        (self.addr_group, self.addr_node)
    }

    /// Current operating state
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Move the sensor into a new operating state (external command layer)
    pub fn set_state(&mut self, state: SensorState) {
        self.state = state;
    }

    /// Drop the sensor into the general error sink
    pub fn mark_error(&mut self) {
        self.state = SensorState::Error;
    }

    /// Calibration strategy in use
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Whether columns in the shared store have been assigned yet
    pub fn has_columns(&self) -> bool {
        !self.cols_in.is_empty() || !self.cols_out.is_empty()
    }

    /// Column indices of this sensor's channels as (input, output)
    pub fn columns(&self) -> (&[usize], &[usize]) {
        (&self.cols_in, &self.cols_out)
    }

    /// One-time claim of this sensor's columns in the shared store.
    /// Appends one column per input and output channel and records the
    /// assigned indices. Calling it twice is a configuration-fatal error:
    /// the arrays would grow without bound.
    pub fn assign_columns(&mut self, store: &mut SampleStore) -> Result<()> {
        if self.has_columns() {
            return Err(LoadMonError::ColumnsAlreadyAssigned {
                sensor: self.label(),
            });
        }
        let (cols_in, cols_out) =
            store.assign_columns(self.chans_in.len(), self.chans_out.len())?;
        for (chan, &col) in self.chans_in.iter_mut().zip(&cols_in) {
            chan.index_store = Some(col);
        }
        for (chan, &col) in self.chans_out.iter_mut().zip(&cols_out) {
            chan.index_store = Some(col);
        }
        self.cols_in = cols_in;
        self.cols_out = cols_out;
        Ok(())
    }

    /// Bind the sensor to the system-owned store without copying. Must be
    /// called before any data update.
    pub fn register(&mut self, store: SharedSampleStore) {
        self.store = Some(store);
    }

    fn store_handle(&self) -> Result<SharedSampleStore> {
        self.store
            .clone()
            .ok_or_else(|| LoadMonError::NotRegistered {
                sensor: self.label(),
            })
    }

    /// Feed a new row of raw values, with calibration enabled
    pub fn update(&mut self, raw: &[f64]) -> Result<()> {
        self.update_with(raw, true)
    }

    /// Feed a new row of raw values.
    ///
    /// Rolls the sensor's input columns, writes `raw` as the newest row,
    /// optionally recalibrates the output row, and always re-applies the
    /// zero correction to the shown output row. Values beyond the channel
    /// count are ignored; a shortfall is rejected before anything is
    /// written.
    pub fn update_with(&mut self, raw: &[f64], do_calibrate: bool) -> Result<()> {
        if raw.len() < self.chans_in.len() {
            return Err(LoadMonError::LengthMismatch {
                expected: self.chans_in.len(),
                got: raw.len(),
            });
        }

        let handle = self.store_handle()?;
        let output_head = {
            let mut store = lock_store(&handle);
            store.push_input(&self.cols_in, raw)?;

            if do_calibrate {
                let inputs = store.input_head(&self.cols_in);
                let calibrated = self.calibration.apply(&inputs, self.cols_out.len());
                store.push_output(&self.cols_out, &calibrated)?;
            }

            // zeroing is always done
            let inputs = store.input_head(&self.cols_in);
            let calibrated = self.calibration.apply(&inputs, self.cols_out.len());
            let corrected: Vec<f64> = calibrated
                .iter()
                .zip(&self.zero_out)
                .map(|(c, z)| c - z)
                .collect();
            store.write_output_head(&self.cols_out, &corrected)?;
            store.output_head(&self.cols_out)
        };

        for (chan, v) in self.chans_in.iter_mut().zip(raw) {
            chan.value = *v;
        }
        for (chan, v) in self.chans_out.iter_mut().zip(&output_head) {
            chan.value = *v;
        }
        self.last_rx = Instant::now();
        Ok(())
    }

    /// Capture the current row-0 values (or the supplied overrides) as
    /// the new zero offsets, then rewrite the shown output row as
    /// calibrated-minus-zero. Immediately after zeroing the shown output
    /// is exactly zero on every channel, no matter how often this is
    /// called.
    ///
    /// Returns the captured offsets as (output, input).
    pub fn zero_set(
        &mut self,
        override_in: Option<&[f64]>,
        override_out: Option<&[f64]>,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let handle = self.store_handle()?;
        let mut store = lock_store(&handle);

        self.zero_in = match override_in {
            Some(vals) => {
                if vals.len() != self.zero_in.len() {
                    return Err(LoadMonError::LengthMismatch {
                        expected: self.zero_in.len(),
                        got: vals.len(),
                    });
                }
                vals.to_vec()
            }
            None => store.input_head(&self.cols_in),
        };

        self.zero_out = match override_out {
            Some(vals) => {
                if vals.len() != self.zero_out.len() {
                    return Err(LoadMonError::LengthMismatch {
                        expected: self.zero_out.len(),
                        got: vals.len(),
                    });
                }
                vals.to_vec()
            }
            None => {
                let inputs = store.input_head(&self.cols_in);
                self.calibration.apply(&inputs, self.cols_out.len())
            }
        };

        let inputs = store.input_head(&self.cols_in);
        let calibrated = self.calibration.apply(&inputs, self.cols_out.len());
        let corrected: Vec<f64> = calibrated
            .iter()
            .zip(&self.zero_out)
            .map(|(c, z)| c - z)
            .collect();
        store.write_output_head(&self.cols_out, &corrected)?;

        let head = store.output_head(&self.cols_out);
        drop(store);
        for (chan, v) in self.chans_out.iter_mut().zip(&head) {
            chan.value = *v;
        }

        Ok((self.zero_out.clone(), self.zero_in.clone()))
    }

    /// Current zero offsets as (output, input)
    pub fn zero_get(&self) -> (&[f64], &[f64]) {
        (&self.zero_out, &self.zero_in)
    }

    /// The most recent `n` rows (default 1) of this sensor's output and
    /// input columns, newest first. `None` if the sensor has not been
    /// registered with a store yet.
    pub fn current(&self, n: Option<usize>) -> Option<(Array2<f64>, Array2<f64>)> {
        let store = self.store.as_ref()?;
        let guard = lock_store(store);
        let n = n.unwrap_or(1);
        Some((
            guard.output_recent(&self.cols_out, n),
            guard.input_recent(&self.cols_in, n),
        ))
    }

    /// The most recent `n` rows (default 1) of the raw input columns only
    pub fn current_inputs(&self, n: Option<usize>) -> Option<Array2<f64>> {
        self.current(n).map(|(_, inputs)| inputs)
    }

    /// The most recent `n` rows (default 1) of the calibrated output
    /// columns only
    pub fn current_outputs(&self, n: Option<usize>) -> Option<Array2<f64>> {
        self.current(n).map(|(outputs, _)| outputs)
    }

    /// Reset this sensor's columns of the shared store to a fill value
    pub fn clear(&mut self, value: f64) -> Result<()> {
        let handle = self.store_handle()?;
        let mut store = lock_store(&handle);
        store.clear_columns(&self.cols_in, &self.cols_out, value);
        Ok(())
    }

    /// Regular processing: evaluate the staleness timeout. `Init` is
    /// exempt — a sensor that has never reported is not yet lost.
    pub fn process(&mut self) {
        if self.state != SensorState::Init && self.last_rx.elapsed() > self.timeout {
            if self.state != SensorState::ErrorTimeout {
                tracing::warn!(
                    sensor = %self.label(),
                    "no data for {:?}, marking timed out",
                    self.timeout
                );
            }
            self.state = SensorState::ErrorTimeout;
        }
    }

    /// Record a received raw message for duplicate detection.
    /// Returns `false` if the identical message is already in the ring
    /// (a duplicate reaching us through a second collector).
    pub fn observe_rx(&mut self, packet: &[u8]) -> bool {
        self.last_rx = Instant::now();
        if self.rx_ring.iter().any(|p| p == packet) {
            return false;
        }
        if self.rx_ring.len() >= RX_RING_CAPACITY {
            self.rx_ring.pop_front();
        }
        self.rx_ring.push_back(packet.to_vec());
        true
    }

    /// The last recorded raw message, if any
    pub fn last_rx_packet(&self) -> Option<&[u8]> {
        self.rx_ring.back().map(|v| v.as_slice())
    }

    /// When the device was last heard from
    pub fn last_rx(&self) -> Instant {
        self.last_rx
    }

    /// Short label for log and error messages
    pub fn label(&self) -> String {
        if self.info.name.is_empty() {
            format!("{:?}@{}", self.devtype, self.addr_str())
        } else {
            self.info.name.clone()
        }
    }

    /// Address string for display, e.g. "G=01 A=03"
    pub fn addr_str(&self) -> String {
        match self.addr_node {
            Some(node) => format!("G={:02} A={:02}", self.addr_group, node),
            None => format!("G={:02} A=--", self.addr_group),
        }
    }
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SEN: {} T={:?} {} S={} | IN:",
            self.label(),
            self.devtype,
            self.addr_str(),
            self.state.display_name(),
        )?;
        for chan in &self.chans_in {
            write!(f, " [{}]={:.2}", chan.index_sensor, chan.value)?;
        }
        write!(f, " OUT:")?;
        for chan in &self.chans_out {
            write!(f, " [{}]={:.2}", chan.index_sensor, chan.value)?;
        }
        Ok(())
    }
}

/// Lock the shared store, recovering from poisoning. A poisoned lock only
/// means another thread panicked mid-write; the matrices themselves stay
/// structurally valid.
fn lock_store(store: &SharedSampleStore) -> MutexGuard<'_, SampleStore> {
    match store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SampleStore;
    use std::sync::{Arc, Mutex};

    fn registered_sensor(devtype: SensorType, calibration: Calibration) -> Sensor {
        let store = Arc::new(Mutex::new(SampleStore::new(8)));
        let mut sensor = Sensor::new(devtype, calibration);
        {
            let mut guard = store.lock().unwrap();
            sensor.assign_columns(&mut guard).unwrap();
        }
        sensor.register(store);
        sensor
    }

    #[test]
    fn test_channel_count_table() {
        let expected: &[(SensorType, usize, usize)] = &[
            (SensorType::BkmW1Ch0, 1, 1),
            (SensorType::BkmW1Ch1, 1, 1),
            (SensorType::BkmW2ChSum, 2, 1),
            (SensorType::BkmW2ChDual, 2, 2),
            (SensorType::RkmW2Ch, 2, 1),
            (SensorType::PintWCh1, 1, 1),
            (SensorType::PintWCh2, 2, 2),
            (SensorType::PintWCh4, 4, 4),
            (SensorType::PintWCh8, 8, 8),
        ];
        for &(devtype, n_in, n_out) in expected {
            let sensor = Sensor::new(devtype, Calibration::default());
            assert_eq!(sensor.chans_in.len(), n_in, "{devtype:?} inputs");
            assert_eq!(sensor.chans_out.len(), n_out, "{devtype:?} outputs");
            assert_eq!(sensor.zero_get().1.len(), n_in);
            assert_eq!(sensor.zero_get().0.len(), n_out);
        }
    }

    #[test]
    fn test_group_addr_per_family() {
        assert_eq!(SensorType::BkmW2ChSum.group_addr(), 1);
        assert_eq!(SensorType::RkmW2Ch.group_addr(), 1);
        assert_eq!(SensorType::PintWCh4.group_addr(), 4);
    }

    #[test]
    fn test_update_before_register_fails() {
        let mut sensor = Sensor::new(SensorType::BkmW2ChSum, Calibration::PlainSum);
        let err = sensor.update(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, LoadMonError::NotRegistered { .. }));
    }

    #[test]
    fn test_double_column_assignment_fails() {
        let mut store = SampleStore::new(4);
        let mut sensor = Sensor::new(SensorType::RkmW2Ch, Calibration::PlainSum);
        sensor.assign_columns(&mut store).unwrap();
        let err = sensor.assign_columns(&mut store).unwrap_err();
        assert!(matches!(err, LoadMonError::ColumnsAlreadyAssigned { .. }));
    }

    #[test]
    fn test_update_shortfall_rejected() {
        let mut sensor = registered_sensor(SensorType::RkmW2Ch, Calibration::PlainSum);
        let err = sensor.update(&[1.0]).unwrap_err();
        assert!(matches!(err, LoadMonError::LengthMismatch { .. }));
    }

    #[test]
    fn test_update_excess_ignored() {
        let mut sensor = registered_sensor(SensorType::RkmW2Ch, Calibration::PlainSum);
        sensor.update(&[1.0, 2.0, 99.0, 98.0]).unwrap();
        let inputs = sensor.current_inputs(None).unwrap();
        assert_eq!(inputs[[0, 0]], 1.0);
        assert_eq!(inputs[[0, 1]], 2.0);
    }

    #[test]
    fn test_calibration_scaled_sum() {
        let mut sensor =
            registered_sensor(SensorType::RkmW2Ch, Calibration::ScaledSum { factor: 10.0 });
        sensor.update(&[10.0, 10.0]).unwrap();
        let outputs = sensor.current_outputs(None).unwrap();
        assert_eq!(outputs[[0, 0]], 200.0);
    }

    #[test]
    fn test_zero_idempotent() {
        let mut sensor =
            registered_sensor(SensorType::RkmW2Ch, Calibration::ScaledSum { factor: 10.0 });
        sensor.update(&[3.0, 4.0]).unwrap();

        for _ in 0..10 {
            sensor.zero_set(None, None).unwrap();
            let outputs = sensor.current_outputs(None).unwrap();
            assert_eq!(outputs[[0, 0]], 0.0);
        }
    }

    #[test]
    fn test_zero_then_update_shows_delta() {
        let mut sensor = registered_sensor(SensorType::BkmW2ChSum, Calibration::PlainSum);
        sensor.update(&[5.0, 5.0]).unwrap();
        sensor.zero_set(None, None).unwrap();
        sensor.update(&[7.0, 7.0]).unwrap();
        let outputs = sensor.current_outputs(None).unwrap();
        // (7 + 7) - zero offset (5 + 5)
        assert_eq!(outputs[[0, 0]], 4.0);
    }

    #[test]
    fn test_zero_override_length_checked() {
        let mut sensor = registered_sensor(SensorType::RkmW2Ch, Calibration::PlainSum);
        let err = sensor.zero_set(Some(&[1.0, 2.0, 3.0]), None).unwrap_err();
        assert!(matches!(err, LoadMonError::LengthMismatch { .. }));
    }

    #[test]
    fn test_current_rows_newest_first() {
        let mut sensor = registered_sensor(SensorType::PintWCh1, Calibration::PlainSum);
        for v in [1.0, 2.0, 3.0] {
            sensor.update(&[v]).unwrap();
        }
        let inputs = sensor.current_inputs(Some(3)).unwrap();
        assert_eq!(inputs[[0, 0]], 3.0);
        assert_eq!(inputs[[1, 0]], 2.0);
        assert_eq!(inputs[[2, 0]], 1.0);
    }

    #[test]
    fn test_current_without_store_is_none() {
        let sensor = Sensor::new(SensorType::PintWCh1, Calibration::PlainSum);
        assert!(sensor.current(None).is_none());
    }

    #[test]
    fn test_timeout_transition() {
        let mut sensor = registered_sensor(SensorType::BkmW1Ch0, Calibration::NoCalibration)
            .with_timeout(Duration::from_millis(0));
        sensor.set_state(SensorState::Measure);
        std::thread::sleep(Duration::from_millis(2));
        sensor.process();
        assert_eq!(sensor.state(), SensorState::ErrorTimeout);
    }

    #[test]
    fn test_init_exempt_from_timeout() {
        let mut sensor = Sensor::new(SensorType::BkmW1Ch0, Calibration::NoCalibration)
            .with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(2));
        sensor.process();
        assert_eq!(sensor.state(), SensorState::Init);
    }

    #[test]
    fn test_rx_duplicate_detection() {
        let mut sensor = Sensor::new(SensorType::BkmW1Ch0, Calibration::NoCalibration);
        assert!(sensor.observe_rx(b"frame-1"));
        assert!(!sensor.observe_rx(b"frame-1"));
        assert!(sensor.observe_rx(b"frame-2"));
        assert_eq!(sensor.last_rx_packet(), Some(b"frame-2".as_slice()));
    }

    #[test]
    fn test_rx_ring_bounded() {
        let mut sensor = Sensor::new(SensorType::BkmW1Ch0, Calibration::NoCalibration);
        for i in 0..(RX_RING_CAPACITY + 5) {
            sensor.observe_rx(format!("frame-{i}").as_bytes());
        }
        // the oldest frames fell out, so they read as new again
        assert!(sensor.observe_rx(b"frame-0"));
    }

    #[test]
    fn test_clear_fills_columns() {
        let mut sensor = registered_sensor(SensorType::RkmW2Ch, Calibration::PlainSum);
        sensor.clear(1.0).unwrap();
        let inputs = sensor.current_inputs(Some(8)).unwrap();
        assert!(inputs.iter().all(|&v| v == 1.0));
    }
}
