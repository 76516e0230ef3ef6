//! Measurement channel metadata and last-value storage
//!
//! A [`Channel`] describes one scalar measurement signal: its semantic kind
//! (physical, virtual, simulated), its index position inside the owning
//! sensor and inside the system-wide shared arrays, display metadata (name,
//! unit, plot style, color) and the last observed value. Channels are owned
//! by exactly one sensor and live as long as that sensor.
//!
//! History storage is *not* kept here; bulk data lives in the shared
//! [`SampleStore`](crate::store::SampleStore) and the channel only records
//! its assigned column index.

use serde::{Deserialize, Serialize};

/// Semantic kind of a measurement channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// A real, physically measured signal (default)
    #[default]
    Physical,
    /// Derived from other channels by calculation
    Virtual,
    /// Synthetic values, flagged so displays can mark them
    Simulated,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Physical => write!(f, "physical"),
            ChannelKind::Virtual => write!(f, "virtual"),
            ChannelKind::Simulated => write!(f, "simulated"),
        }
    }
}

/// Visual style for plotting channel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PlotStyle {
    /// Standard line plot (default)
    #[default]
    Line,
    /// Scatter plot showing individual data points
    Scatter,
    /// Step plot with horizontal-then-vertical transitions
    Step,
}

impl PlotStyle {
    /// Get display name for this plot style
    pub fn display_name(&self) -> &'static str {
        match self {
            PlotStyle::Line => "Line",
            PlotStyle::Scatter => "Scatter",
            PlotStyle::Step => "Step",
        }
    }
}

/// One scalar measurement signal belonging to a sensor
#[derive(Debug, Clone)]
pub struct Channel {
    /// Semantic kind of the channel
    pub kind: ChannelKind,
    /// Index within the owning sensor's channel list, assigned at
    /// sensor construction
    pub index_sensor: usize,
    /// Column index in the system-wide shared array; `None` until the
    /// sensor's columns are assigned
    pub index_store: Option<usize>,
    /// Application-facing channel name (e.g. "MP1(CH2)")
    pub name: String,
    /// Channel name assigned by the customer (e.g. "F Rad 1")
    pub name_customer: String,
    /// Unit label for display (e.g. "kN", "bar", "g")
    pub unit: String,
    /// Color for plotting (RGBA)
    pub color: [u8; 4],
    /// Visual style for plotting this channel
    pub plot_style: PlotStyle,
    /// Optional Rhai script for value conversion, applied at query time
    pub converter_script: Option<String>,
    /// Last observed scalar value
    pub value: f64,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            kind: ChannelKind::Physical,
            index_sensor: 0,
            index_store: None,
            name: String::from("CH"),
            name_customer: String::new(),
            unit: String::from("g"),
            color: [0, 0, 0, 255],
            plot_style: PlotStyle::default(),
            converter_script: None,
            value: 0.0,
        }
    }
}

impl Channel {
    /// Create a channel at the given position within its sensor.
    /// Automatically assigns a distinct color based on the position.
    pub fn new(index_sensor: usize) -> Self {
        Self {
            index_sensor,
            color: Self::generate_color(index_sensor as u32),
            ..Default::default()
        }
    }

    /// Set the application-facing name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the customer-facing name
    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.name_customer = name.into();
        self
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the channel kind
    pub fn with_kind(mut self, kind: ChannelKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the converter script
    pub fn with_converter(mut self, script: impl Into<String>) -> Self {
        self.converter_script = Some(script.into());
        self
    }

    /// Generate a distinct color based on an index
    /// Uses the golden ratio to spread hues evenly across the color wheel
    pub fn generate_color(index: u32) -> [u8; 4] {
        const GOLDEN_RATIO: f32 = 0.618033988749895;

        let hue = ((index as f32 * GOLDEN_RATIO) % 1.0) * 360.0;
        let saturation = 0.7;
        let value = 0.85;

        let (r, g, b) = hsv_to_rgb(hue, saturation, value);
        [r, g, b, 255]
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CH:{} = {:.2} {} | {} [{} {}]",
            self.name,
            self.value,
            self.unit,
            self.kind,
            self.index_sensor,
            self.index_store.map_or(-1, |i| i as i64),
        )
    }
}

/// Convert HSV (hue 0-360, saturation 0-1, value 0-1) to RGB (u8, u8, u8)
fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> (u8, u8, u8) {
    let c = value * saturation;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = value - c;

    let (r, g, b) = match (hue / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_defaults() {
        let chan = Channel::new(2);
        assert_eq!(chan.kind, ChannelKind::Physical);
        assert_eq!(chan.index_sensor, 2);
        assert!(chan.index_store.is_none());
        assert_eq!(chan.value, 0.0);
    }

    #[test]
    fn test_channel_builder() {
        let chan = Channel::new(0)
            .with_name("F1")
            .with_customer_name("F Rad 1")
            .with_unit("kN")
            .with_kind(ChannelKind::Simulated)
            .with_converter("value * 2.0");
        assert_eq!(chan.name, "F1");
        assert_eq!(chan.name_customer, "F Rad 1");
        assert_eq!(chan.unit, "kN");
        assert_eq!(chan.kind, ChannelKind::Simulated);
        assert_eq!(chan.converter_script.as_deref(), Some("value * 2.0"));
    }

    #[test]
    fn test_generated_colors_differ() {
        let a = Channel::generate_color(0);
        let b = Channel::generate_color(1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_contains_name_and_unit() {
        let chan = Channel::new(0).with_name("MP1(CH1)").with_unit("bar");
        let s = chan.to_string();
        assert!(s.contains("MP1(CH1)"));
        assert!(s.contains("bar"));
    }
}
