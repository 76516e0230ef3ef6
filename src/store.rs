//! Shared sample storage for all sensors of a measurement system
//!
//! The [`SampleStore`] owns the two dense history matrices of a measurement
//! system: one for raw input values and one for calibrated output values.
//! Rows are time history with row 0 holding the newest sample; columns are
//! one per channel across *all* registered sensors. Sensors never own a
//! copy of this data — they hold column indices handed out by
//! [`SampleStore::assign_columns`] and reach the matrices through the
//! system's shared handle.
//!
//! Both matrices always have the same row count and roll together, so the
//! input and output history stay aligned sample-for-sample.
//!
//! All access goes through one `Mutex` (see [`SharedSampleStore`]); the
//! original design left raw array writes unsynchronized and relied on each
//! sensor only touching its own columns, which is a hazard this rewrite
//! closes.

use ndarray::{concatenate, Array2, Axis};
use std::sync::{Arc, Mutex};

use crate::error::{LoadMonError, Result};

/// Default history depth (rows) for a system's sample matrices
pub const DEFAULT_DEPTH: usize = 50;

/// Thread-safe shared handle to a sample store
pub type SharedSampleStore = Arc<Mutex<SampleStore>>;

/// Dense input/output history matrices shared by a measurement system
#[derive(Debug, Clone)]
pub struct SampleStore {
    /// Raw input samples, rows = history (row 0 newest), one column per
    /// input channel
    input: Array2<f64>,
    /// Calibrated output samples, same row layout, one column per output
    /// channel
    output: Array2<f64>,
}

impl SampleStore {
    /// Create an empty store with the given history depth and no columns.
    /// Columns are added as sensors register via [`Self::assign_columns`].
    pub fn new(depth: usize) -> Self {
        Self {
            input: Array2::zeros((depth, 0)),
            output: Array2::zeros((depth, 0)),
        }
    }

    /// Create a shared handle around a fresh store
    pub fn shared(depth: usize) -> SharedSampleStore {
        Arc::new(Mutex::new(Self::new(depth)))
    }

    /// History depth (number of rows)
    pub fn depth(&self) -> usize {
        self.input.nrows()
    }

    /// Number of input columns currently assigned
    pub fn input_width(&self) -> usize {
        self.input.ncols()
    }

    /// Number of output columns currently assigned
    pub fn output_width(&self) -> usize {
        self.output.ncols()
    }

    /// Append `n_in` input columns and `n_out` output columns, returning
    /// the assigned column indices. Column indices are stable for the
    /// lifetime of the store.
    pub fn assign_columns(
        &mut self,
        n_in: usize,
        n_out: usize,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let first_in = self.input.ncols();
        let first_out = self.output.ncols();

        self.input = grow_columns(&self.input, n_in)?;
        self.output = grow_columns(&self.output, n_out)?;

        let cols_in = (first_in..first_in + n_in).collect();
        let cols_out = (first_out..first_out + n_out).collect();
        Ok((cols_in, cols_out))
    }

    /// Fill the given columns of both matrices with a constant value
    pub fn clear_columns(&mut self, cols_in: &[usize], cols_out: &[usize], value: f64) {
        for &c in cols_in {
            self.input.column_mut(c).fill(value);
        }
        for &c in cols_out {
            self.output.column_mut(c).fill(value);
        }
    }

    /// Roll the given input columns down one row (dropping the oldest) and
    /// write `vals` as the new row 0. Excess values are ignored; a
    /// shortfall is a contract violation.
    pub fn push_input(&mut self, cols: &[usize], vals: &[f64]) -> Result<()> {
        if vals.len() < cols.len() {
            return Err(LoadMonError::LengthMismatch {
                expected: cols.len(),
                got: vals.len(),
            });
        }
        roll_columns(&mut self.input, cols);
        for (v, &c) in vals.iter().zip(cols) {
            self.input[[0, c]] = *v;
        }
        Ok(())
    }

    /// Roll the given output columns down one row and write `vals` as the
    /// new row 0
    pub fn push_output(&mut self, cols: &[usize], vals: &[f64]) -> Result<()> {
        if vals.len() < cols.len() {
            return Err(LoadMonError::LengthMismatch {
                expected: cols.len(),
                got: vals.len(),
            });
        }
        roll_columns(&mut self.output, cols);
        for (v, &c) in vals.iter().zip(cols) {
            self.output[[0, c]] = *v;
        }
        Ok(())
    }

    /// Overwrite row 0 of the given output columns without rolling.
    /// Used for re-applying zero correction to the currently shown value.
    pub fn write_output_head(&mut self, cols: &[usize], vals: &[f64]) -> Result<()> {
        if vals.len() < cols.len() {
            return Err(LoadMonError::LengthMismatch {
                expected: cols.len(),
                got: vals.len(),
            });
        }
        for (v, &c) in vals.iter().zip(cols) {
            self.output[[0, c]] = *v;
        }
        Ok(())
    }

    /// Newest input values for the given columns
    pub fn input_head(&self, cols: &[usize]) -> Vec<f64> {
        cols.iter().map(|&c| self.input[[0, c]]).collect()
    }

    /// Newest output values for the given columns
    pub fn output_head(&self, cols: &[usize]) -> Vec<f64> {
        cols.iter().map(|&c| self.output[[0, c]]).collect()
    }

    /// The most recent `n` input rows for the given columns, newest first
    pub fn input_recent(&self, cols: &[usize], n: usize) -> Array2<f64> {
        copy_recent(&self.input, cols, n)
    }

    /// The most recent `n` output rows for the given columns, newest first
    pub fn output_recent(&self, cols: &[usize], n: usize) -> Array2<f64> {
        copy_recent(&self.output, cols, n)
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

/// Append `n` zeroed columns to a matrix, copying the existing data.
/// Matches the append-and-copy behavior the column-assignment protocol
/// expects: indices of existing columns never move.
fn grow_columns(arr: &Array2<f64>, n: usize) -> Result<Array2<f64>> {
    if n == 0 {
        return Ok(arr.clone());
    }
    let extra = Array2::zeros((arr.nrows(), n));
    concatenate(Axis(1), &[arr.view(), extra.view()]).map_err(|e| {
        LoadMonError::Config(format!("failed to grow sample matrix: {e}"))
    })
}

/// Shift the given columns down one row so row 0 is free for the newest
/// sample; the oldest row falls off the end
fn roll_columns(arr: &mut Array2<f64>, cols: &[usize]) {
    let rows = arr.nrows();
    if rows == 0 {
        return;
    }
    for &c in cols {
        for r in (1..rows).rev() {
            arr[[r, c]] = arr[[r - 1, c]];
        }
    }
}

/// Copy the top `n` rows (clamped to depth) of the given columns
fn copy_recent(arr: &Array2<f64>, cols: &[usize], n: usize) -> Array2<f64> {
    let n = n.min(arr.nrows());
    let mut out = Array2::zeros((n, cols.len()));
    for (j, &c) in cols.iter().enumerate() {
        for r in 0..n {
            out[[r, j]] = arr[[r, c]];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_columns_sequential() {
        let mut store = SampleStore::new(4);
        let (in_a, out_a) = store.assign_columns(2, 1).unwrap();
        let (in_b, out_b) = store.assign_columns(2, 1).unwrap();

        assert_eq!(in_a, vec![0, 1]);
        assert_eq!(out_a, vec![0]);
        assert_eq!(in_b, vec![2, 3]);
        assert_eq!(out_b, vec![1]);
        assert_eq!(store.input_width(), 4);
        assert_eq!(store.output_width(), 2);
        assert_eq!(store.depth(), 4);
    }

    #[test]
    fn test_push_newest_first() {
        let mut store = SampleStore::new(3);
        let (cols, _) = store.assign_columns(1, 0).unwrap();

        store.push_input(&cols, &[1.0]).unwrap();
        store.push_input(&cols, &[2.0]).unwrap();
        store.push_input(&cols, &[3.0]).unwrap();

        let recent = store.input_recent(&cols, 3);
        assert_eq!(recent[[0, 0]], 3.0);
        assert_eq!(recent[[1, 0]], 2.0);
        assert_eq!(recent[[2, 0]], 1.0);
    }

    #[test]
    fn test_oldest_row_dropped() {
        let mut store = SampleStore::new(2);
        let (cols, _) = store.assign_columns(1, 0).unwrap();

        for v in [1.0, 2.0, 3.0] {
            store.push_input(&cols, &[v]).unwrap();
        }
        let recent = store.input_recent(&cols, 2);
        assert_eq!(recent[[0, 0]], 3.0);
        assert_eq!(recent[[1, 0]], 2.0);
    }

    #[test]
    fn test_push_only_touches_own_columns() {
        let mut store = SampleStore::new(2);
        let (a, _) = store.assign_columns(1, 0).unwrap();
        let (b, _) = store.assign_columns(1, 0).unwrap();

        store.push_input(&a, &[5.0]).unwrap();
        store.push_input(&b, &[9.0]).unwrap();
        store.push_input(&a, &[6.0]).unwrap();

        assert_eq!(store.input_head(&a), vec![6.0]);
        // sensor B's column must be untouched by A's second push
        assert_eq!(store.input_head(&b), vec![9.0]);
    }

    #[test]
    fn test_excess_values_ignored_shortfall_rejected() {
        let mut store = SampleStore::new(2);
        let (cols, _) = store.assign_columns(2, 0).unwrap();

        store.push_input(&cols, &[1.0, 2.0, 99.0, 99.0]).unwrap();
        assert_eq!(store.input_head(&cols), vec![1.0, 2.0]);

        let err = store.push_input(&cols, &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            LoadMonError::LengthMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_clear_columns() {
        let mut store = SampleStore::new(3);
        let (cin, cout) = store.assign_columns(1, 1).unwrap();
        store.clear_columns(&cin, &cout, 1.5);

        let recent = store.input_recent(&cin, 3);
        assert!(recent.iter().all(|&v| v == 1.5));
        let recent = store.output_recent(&cout, 3);
        assert!(recent.iter().all(|&v| v == 1.5));
    }

    #[test]
    fn test_recent_clamps_to_depth() {
        let mut store = SampleStore::new(2);
        let (cols, _) = store.assign_columns(1, 0).unwrap();
        let recent = store.input_recent(&cols, 10);
        assert_eq!(recent.nrows(), 2);
    }
}
