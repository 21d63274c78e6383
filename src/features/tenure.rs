//! Tenure bucketing into fixed 12-month bins

use serde::Serialize;

/// First month covered by the bins
pub const TENURE_BIN_START: i64 = 1;

/// Width of every bin, in months
pub const TENURE_BIN_WIDTH: i64 = 12;

/// Bin labels, lower bound inclusive, upper bound inclusive
pub const TENURE_LABELS: [&str; 6] = ["1-12", "13-24", "25-36", "37-48", "49-60", "61-72"];

/// Label used for tenure outside every bin.
///
/// An unbinned tenure in the reference dataset encodes as `nan`, so the
/// live side uses the same label to land on the same column.
pub const OUT_OF_RANGE_LABEL: &str = "nan";

/// Derived categorical tenure feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TenureBucket {
    /// Index into [`TENURE_LABELS`]
    Bin(usize),
    /// Tenure of 0, negative, or 73 months and beyond
    OutOfRange,
}

impl TenureBucket {
    /// Bucket a tenure in whole months.
    ///
    /// Bins are half-open `[1, 13)`, `[13, 25)`, ..., `[61, 73)`.
    pub fn from_months(months: i64) -> Self {
        if months < TENURE_BIN_START {
            return TenureBucket::OutOfRange;
        }
        let index = ((months - TENURE_BIN_START) / TENURE_BIN_WIDTH) as usize;
        if index < TENURE_LABELS.len() {
            TenureBucket::Bin(index)
        } else {
            TenureBucket::OutOfRange
        }
    }

    /// Category label used in one-hot column names
    pub fn label(&self) -> &'static str {
        match self {
            TenureBucket::Bin(index) => TENURE_LABELS[*index],
            TenureBucket::OutOfRange => OUT_OF_RANGE_LABEL,
        }
    }

    /// Whether the tenure fell outside every bin
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, TenureBucket::OutOfRange)
    }
}
