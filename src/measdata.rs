//! Standalone measurement recordings with labels, timestamps and saved
//! rows
//!
//! [`MeasurementData`] is a self-contained sliding window independent of
//! the live sensor arrays: a labelled value matrix plus a parallel
//! per-channel timestamp matrix, rolled together (row 0 = newest). It
//! carries its own zero offsets, a separate store of saved rows with
//! free-form annotations, and a finalize latch that freezes the window
//! until explicitly released.
//!
//! Typical lifecycle: construct with labels, feed rows via
//! [`MeasurementData::update`], optionally [`MeasurementData::zero_set`],
//! [`MeasurementData::save`] the interesting rows, then
//! [`MeasurementData::finalize`] to freeze the window for reporting.

use ndarray::Array2;
use std::time::Instant;

use crate::error::{LoadMonError, Result};
use crate::store::DEFAULT_DEPTH;

/// One row held by [`MeasurementData::save`], with its annotation
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRow {
    /// Zero-corrected values at the moment of saving
    pub values: Vec<f64>,
    /// Timestamps of those values
    pub times: Vec<f64>,
    /// Free-form annotation (operator, vehicle, remark)
    pub info: String,
}

/// Summary statistics for one value column, computed at finalize
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// A labelled, timestamped sliding measurement window
#[derive(Debug, Clone)]
pub struct MeasurementData {
    /// One label per value column
    labels: Vec<String>,
    /// Value history, rows = time (row 0 newest), one column per label
    current_y: Array2<f64>,
    /// Per-channel timestamps, same layout as `current_y`
    current_t: Array2<f64>,
    /// Saved rows, slot space independent of the live window
    saved: Vec<SavedRow>,
    /// Zero offsets, one per value column
    zero: Vec<f64>,
    /// Last raw (uncorrected) row, kept so zeroing stays idempotent
    last_raw: Vec<f64>,
    /// Running sample counter, incremented per update
    index: usize,
    /// Construction time, origin of the default elapsed timestamps
    start: Instant,
    /// Whether zero offsets have been captured
    zeroed: bool,
    /// While set, every window mutation is rejected
    finalized: bool,
    /// Per-label summary statistics, filled when finalizing
    stats: Vec<(String, ColumnStats)>,
}

impl MeasurementData {
    /// Create a window with the given column labels and history depth
    pub fn new(labels: Vec<String>, depth: usize) -> Self {
        let n = labels.len();
        Self {
            labels,
            current_y: Array2::zeros((depth, n)),
            current_t: Array2::zeros((depth, n)),
            saved: Vec::new(),
            zero: vec![0.0; n],
            last_raw: vec![0.0; n],
            index: 0,
            start: Instant::now(),
            zeroed: false,
            finalized: false,
            stats: Vec::new(),
        }
    }

    /// Create a window with the default history depth
    pub fn with_labels(labels: Vec<String>) -> Self {
        Self::new(labels, DEFAULT_DEPTH)
    }

    /// Column labels
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// History depth (rows)
    pub fn depth(&self) -> usize {
        self.current_y.nrows()
    }

    /// Running sample counter
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether zero offsets have been captured
    pub fn is_zeroed(&self) -> bool {
        self.zeroed
    }

    /// Whether the window is currently frozen
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Feed one row of values. The window rolls down (row 0 = newest),
    /// zero offsets are subtracted before storing, and the sample counter
    /// advances. Returns the new counter value.
    ///
    /// `times` carries one timestamp per channel; when omitted, the
    /// elapsed seconds since construction are stamped on every channel of
    /// the row.
    ///
    /// Rejected with [`LoadMonError::FinalizedWrite`] while frozen and
    /// with [`LoadMonError::LengthMismatch`] when `values` (or a supplied
    /// `times`) does not match the label count exactly; nothing is
    /// partially written.
    pub fn update(&mut self, values: &[f64], times: Option<&[f64]>) -> Result<usize> {
        if self.finalized {
            return Err(LoadMonError::FinalizedWrite);
        }
        let n = self.labels.len();
        if values.len() != n {
            return Err(LoadMonError::LengthMismatch {
                expected: n,
                got: values.len(),
            });
        }
        if let Some(times) = times {
            if times.len() != n {
                return Err(LoadMonError::LengthMismatch {
                    expected: n,
                    got: times.len(),
                });
            }
        }

        roll_rows(&mut self.current_y);
        roll_rows(&mut self.current_t);
        let elapsed = self.start.elapsed().as_secs_f64();
        for (j, v) in values.iter().enumerate() {
            self.current_y[[0, j]] = v - self.zero[j];
            self.current_t[[0, j]] = times.map_or(elapsed, |t| t[j]);
        }
        self.last_raw.copy_from_slice(values);

        self.index += 1;
        Ok(self.index)
    }

    /// Capture the last written row (or the supplied override) as the new
    /// zero offsets and rewrite the newest stored row accordingly. A
    /// no-op before the first update. Repeated calls without an update in
    /// between are idempotent: the newest row reads zero afterwards.
    pub fn zero_set(&mut self, values: Option<&[f64]>) -> Result<&[f64]> {
        if self.finalized {
            return Err(LoadMonError::FinalizedWrite);
        }
        if self.index == 0 && values.is_none() {
            return Ok(&self.zero);
        }

        match values {
            Some(vals) => {
                if vals.len() != self.zero.len() {
                    return Err(LoadMonError::LengthMismatch {
                        expected: self.zero.len(),
                        got: vals.len(),
                    });
                }
                self.zero.copy_from_slice(vals);
            }
            None => self.zero.copy_from_slice(&self.last_raw),
        }
        for j in 0..self.zero.len() {
            self.current_y[[0, j]] = self.last_raw[j] - self.zero[j];
        }
        self.zeroed = true;
        Ok(&self.zero)
    }

    /// Current zero offsets
    pub fn zero_get(&self) -> &[f64] {
        &self.zero
    }

    /// Copy the newest row into the saved store with an annotation.
    ///
    /// `index` overrides an existing slot; the default appends to the
    /// next free slot, so the slot space grows monotonically. Saving does
    /// not touch the live window and stays available while finalized.
    pub fn save(&mut self, index: Option<usize>, info: impl Into<String>) -> Result<usize> {
        let row = SavedRow {
            values: self.last_y(),
            times: self.last_times(),
            info: info.into(),
        };
        match index {
            Some(i) if i < self.saved.len() => {
                self.saved[i] = row;
                Ok(i)
            }
            Some(i) if i == self.saved.len() => {
                self.saved.push(row);
                Ok(i)
            }
            Some(i) => Err(LoadMonError::Config(format!(
                "saved slot {i} is beyond the next free slot {}",
                self.saved.len()
            ))),
            None => {
                self.saved.push(row);
                Ok(self.saved.len() - 1)
            }
        }
    }

    /// The saved rows, in slot order
    pub fn saved(&self) -> &[SavedRow] {
        &self.saved
    }

    /// Freeze or release the window. Freezing computes per-column summary
    /// statistics over the rows written so far; releasing restores normal
    /// update behavior. Repeating the current state is a no-op.
    pub fn finalize(&mut self, finalized: bool) {
        if finalized == self.finalized {
            return;
        }
        self.finalized = finalized;
        if finalized {
            self.calculate();
        }
    }

    /// Per-column summary statistics from the last freeze; empty before
    /// the first finalize
    pub fn stats(&self) -> &[(String, ColumnStats)] {
        &self.stats
    }

    /// Newest stored row of values
    pub fn last_y(&self) -> Vec<f64> {
        (0..self.labels.len())
            .map(|j| self.current_y[[0, j]])
            .collect()
    }

    /// Newest stored row of timestamps
    pub fn last_times(&self) -> Vec<f64> {
        (0..self.labels.len())
            .map(|j| self.current_t[[0, j]])
            .collect()
    }

    /// Newest stored timestamp of the first channel
    pub fn last_t(&self) -> f64 {
        if self.labels.is_empty() {
            0.0
        } else {
            self.current_t[[0, 0]]
        }
    }

    /// Full value history, newest first
    pub fn history(&self) -> &Array2<f64> {
        &self.current_y
    }

    /// Full timestamp history, newest first
    pub fn timestamps(&self) -> &Array2<f64> {
        &self.current_t
    }

    fn calculate(&mut self) {
        // only rows actually written carry data
        let rows = self.index.min(self.depth());
        self.stats.clear();
        if rows == 0 {
            return;
        }
        for (j, label) in self.labels.iter().enumerate() {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            let mut sum = 0.0;
            for r in 0..rows {
                let v = self.current_y[[r, j]];
                min = min.min(v);
                max = max.max(v);
                sum += v;
            }
            self.stats.push((
                label.clone(),
                ColumnStats {
                    min,
                    max,
                    mean: sum / rows as f64,
                },
            ));
        }
    }
}

impl std::fmt::Display for MeasurementData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MD: n={} depth={} idx={} zeroed={} finalized={} |",
            self.labels.len(),
            self.depth(),
            self.index,
            self.zeroed,
            self.finalized,
        )?;
        for (label, v) in self.labels.iter().zip(self.last_y()) {
            write!(f, " {label}={v:.2}")?;
        }
        Ok(())
    }
}

/// Shift all rows down one step so row 0 is free for the newest sample;
/// the oldest row falls off the end
fn roll_rows(arr: &mut Array2<f64>) {
    let rows = arr.nrows();
    if rows == 0 {
        return;
    }
    for c in 0..arr.ncols() {
        for r in (1..rows).rev() {
            arr[[r, c]] = arr[[r - 1, c]];
        }
    }
}
