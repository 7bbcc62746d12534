//! Types for delivery of pre-aggregated metric time series data.

use std::mem::replace;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::attributes::AttributeSet;
use crate::instrument::Descriptor;
use crate::number::Number;

mod temporality;

pub use temporality::Temporality;

/// The time window of one collection cycle.
///
/// Cumulative points cover `[start, now]`, delta points cover `[last, now]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sequence {
    /// When the instruments started recording.
    pub start: SystemTime,
    /// When the previous collection happened (`start` for the first one).
    pub last: SystemTime,
    /// When this collection happens.
    pub now: SystemTime,
}

/// Issues the [`Sequence`] for successive collection cycles.
#[derive(Debug)]
pub struct SequenceTracker {
    start: SystemTime,
    last: Mutex<SystemTime>,
}

impl SequenceTracker {
    /// Starts tracking at `start`.
    pub fn new(start: SystemTime) -> Self {
        SequenceTracker {
            start,
            last: Mutex::new(start),
        }
    }

    /// Begins a collection cycle ending at `now`.
    pub fn next(&self, now: SystemTime) -> Sequence {
        let mut guard = self.last.lock().unwrap_or_else(|err| err.into_inner());
        let last = replace(&mut *guard, now);
        Sequence {
            start: self.start,
            last,
            now,
        }
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        SequenceTracker::new(SystemTime::now())
    }
}

/// The points produced by one instrument in one collection cycle.
#[derive(Debug, Clone)]
pub struct Instrument {
    /// The instrument that produced the points.
    pub descriptor: Descriptor,
    /// One point per reported timeseries.
    pub points: Vec<Point>,
}

/// A single timeseries value.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// The attribute set identifying the timeseries.
    pub attributes: AttributeSet,
    /// The aggregated value.
    pub aggregation: Aggregation,
    /// Whether `aggregation` covers `[start, end]` since the instrument
    /// started or since the previous collection.
    pub temporality: Temporality,
    /// Beginning of the window.
    pub start: SystemTime,
    /// End of the window.
    pub end: SystemTime,
}

/// An aggregated value.
///
/// Numbers are interpreted with the
/// [`NumberKind`](crate::number::NumberKind) of the instrument's descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// The arithmetic sum of measurements.
    Sum {
        /// The sum.
        value: Number,
        /// Whether the sum can only increase.
        monotonic: bool,
    },
    /// The last measurement.
    Gauge {
        /// The last value.
        value: Number,
    },
    /// An explicit-bucket histogram.
    Histogram(HistogramPoint),
}

/// A histogram with explicitly defined bucket boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramPoint {
    /// The number of measurements.
    pub count: u64,
    /// The sum of measurements.
    pub sum: Number,
    /// The minimum value recorded, when known.
    pub min: Option<Number>,
    /// The maximum value recorded, when known.
    pub max: Option<Number>,
    /// The upper bounds of the buckets of the histogram.
    ///
    /// Because the last boundary is +infinity this one is implied.
    pub bounds: Vec<f64>,
    /// The count of each of the buckets.
    pub bucket_counts: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sequence_tracker_advances_last() {
        let start = SystemTime::UNIX_EPOCH;
        let tracker = SequenceTracker::new(start);
        let t1 = start + Duration::from_secs(10);
        let t2 = start + Duration::from_secs(20);

        let first = tracker.next(t1);
        assert_eq!(first.start, start);
        assert_eq!(first.last, start);
        assert_eq!(first.now, t1);

        let second = tracker.next(t2);
        assert_eq!(second.start, start);
        assert_eq!(second.last, t1);
        assert_eq!(second.now, t2);
    }
}
