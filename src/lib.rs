//! loadmon — measurement acquisition core for wireless load sensors
//!
//! This crate implements the data backbone of a vehicle and crane load
//! measurement site: sensors with raw input and calibrated output
//! channels, shared rolling sample storage, zero adjustment with an
//! append-only audit log, packet address routing, and standalone labelled
//! recordings for reports.
//!
//! # Main Types
//!
//! - [`MeasurementSystem`] — one installation: sensor registry, packet
//!   routing, system-wide zeroing
//! - [`Sensor`] — one device: channel layout, calibration, zero offsets,
//!   staleness state machine
//! - [`SampleStore`] — the shared input/output history matrices all
//!   sensors write into
//! - [`MeasurementData`] — a standalone labelled recording with snapshot
//!   and finalize semantics
//! - [`ZeroMonitor`] — the zero-adjustment audit log
//! - [`SystemConfig`] — declarative TOML description of a system
//!
//! # Example
//!
//! ```no_run
//! use loadmon::{Calibration, MeasurementSystem, Sensor, SensorType};
//!
//! # fn main() -> loadmon::Result<()> {
//! let mut system = MeasurementSystem::new(0, "Crane 1")?;
//! system.add_sensor(
//!     Sensor::new(SensorType::RkmW2Ch, Calibration::ScaledSum { factor: 10.0 })
//!         .with_node_addr(3),
//! )?;
//! system.init()?;
//!
//! system.update_sensor([1, 3], &[10.0, 10.0])?;
//! system.zero_all()?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod convert;
pub mod error;
pub mod measdata;
pub mod sensor;
pub mod store;
pub mod system;
pub mod zeromon;

pub use channel::{Channel, ChannelKind, PlotStyle};
pub use config::SystemConfig;
pub use convert::ConverterEngine;
pub use error::{LoadMonError, Result, ResultExt};
pub use measdata::{ColumnStats, MeasurementData, SavedRow};
pub use sensor::{Calibration, Sensor, SensorInfo, SensorState, SensorType};
pub use store::{SampleStore, SharedSampleStore, DEFAULT_DEPTH};
pub use system::{packet_addr, AddrKey, MeasurementSystem, MAX_SYSTEMS, PACKET_ADDR_OFFSET};
pub use zeromon::ZeroMonitor;
