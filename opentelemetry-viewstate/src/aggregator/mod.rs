//! The aggregation algebra instruments are parametric over.
//!
//! An implementation of [`Methods`] decides what a timeseries *is* (a sum, a
//! last value, a histogram); instruments only decide when storages are
//! created, merged, reset and reported.
use core::fmt;

use crate::data::Aggregation;

mod gauge;
mod histogram;
mod sum;

pub use gauge::{GaugeMethods, GaugeStorage};
pub use histogram::{HistogramMethods, HistogramStorage, DEFAULT_HISTOGRAM_BOUNDS};
pub use sum::{SumMethods, SumStorage};

/// The kinds of aggregation this crate knows how to build.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum AggregationKind {
    /// An arithmetic sum.
    Sum,
    /// The last value recorded.
    Gauge,
    /// An explicit bucket histogram.
    Histogram {
        /// Upper bounds of the buckets, ascending.
        boundaries: Vec<f64>,
    },
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationKind::Sum => f.write_str("sum"),
            AggregationKind::Gauge => f.write_str("gauge"),
            AggregationKind::Histogram { .. } => f.write_str("histogram"),
        }
    }
}

/// Trace context captured alongside a measurement.
///
/// Opaque to instruments; an algebra may keep it as an exemplar or ignore it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExemplarBits {
    /// Trace id of the active span, all zeroes when there is none.
    pub trace_id: [u8; 16],
    /// Span id of the active span, all zeroes when there is none.
    pub span_id: [u8; 8],
    /// Whether the active span is sampled.
    pub sampled: bool,
}

/// Operations over one aggregation's storage.
///
/// Every method takes shared references: instruments merge accumulator
/// snapshots into a holder's storage from many threads without holding the
/// instrument lock, so storages synchronize internally. The only guarantee
/// instruments give is that `from` in [`Methods::move_into`] and `to` in
/// [`Methods::copy`] / [`Methods::move_into`] have a single writer.
pub trait Methods<N>: Send + Sync + 'static {
    /// Per-timeseries state.
    type Storage: Send + Sync + 'static;

    /// A zero-valued storage.
    fn init(&self) -> Self::Storage;

    /// Incorporates one measurement. Must not allocate.
    fn update(&self, storage: &Self::Storage, value: N, exemplar: ExemplarBits);

    /// Adds `from` into `to`, leaving `from` unchanged.
    fn merge(&self, from: &Self::Storage, to: &Self::Storage);

    /// Sets `to` to the contents of `from` and resets `from` to zero.
    fn move_into(&self, from: &Self::Storage, to: &Self::Storage);

    /// Sets `to` to the contents of `from`.
    fn copy(&self, from: &Self::Storage, to: &Self::Storage);

    /// Computes `operand := argument - operand`.
    fn subtract_swap(&self, operand: &Self::Storage, argument: &Self::Storage);

    /// Whether the storage differs from zero.
    fn has_change(&self, storage: &Self::Storage) -> bool;

    /// Reads the storage into an output value.
    fn to_aggregation(&self, storage: &Self::Storage) -> Aggregation;

    /// What this algebra computes.
    fn kind(&self) -> AggregationKind;
}
