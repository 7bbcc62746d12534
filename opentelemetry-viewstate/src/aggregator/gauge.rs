use std::fmt;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard};

use crate::data::Aggregation;
use crate::number::Numeric;

use super::{AggregationKind, ExemplarBits, Methods};

/// Storage for the last recorded value.
///
/// The value and its presence change together under one lock, so a merge
/// racing with a collection never publishes a half-reset value.
pub struct GaugeStorage<N> {
    value: Mutex<Option<N>>,
}

impl<N> GaugeStorage<N> {
    fn lock(&self) -> MutexGuard<'_, Option<N>> {
        self.value.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl<N: Numeric> GaugeStorage<N> {
    /// The last value, if one was recorded since the last reset.
    pub fn value(&self) -> Option<N> {
        *self.lock()
    }
}

impl<N: Numeric> fmt::Debug for GaugeStorage<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaugeStorage")
            .field("value", &self.value())
            .finish()
    }
}

/// Summarizes a set of measurements as the last one made.
pub struct GaugeMethods<N> {
    _number: PhantomData<fn(N)>,
}

impl<N> GaugeMethods<N> {
    /// Creates the last-value algebra.
    pub fn new() -> Self {
        GaugeMethods {
            _number: PhantomData,
        }
    }
}

impl<N> Default for GaugeMethods<N> {
    fn default() -> Self {
        GaugeMethods::new()
    }
}

impl<N> fmt::Debug for GaugeMethods<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GaugeMethods")
    }
}

impl<N: Numeric> Methods<N> for GaugeMethods<N> {
    type Storage = GaugeStorage<N>;

    fn init(&self) -> GaugeStorage<N> {
        GaugeStorage {
            value: Mutex::new(None),
        }
    }

    fn update(&self, storage: &GaugeStorage<N>, value: N, _exemplar: ExemplarBits) {
        *storage.lock() = Some(value);
    }

    fn merge(&self, from: &GaugeStorage<N>, to: &GaugeStorage<N>) {
        if let Some(value) = from.value() {
            *to.lock() = Some(value);
        }
    }

    fn move_into(&self, from: &GaugeStorage<N>, to: &GaugeStorage<N>) {
        let value = from.lock().take();
        *to.lock() = value;
    }

    fn copy(&self, from: &GaugeStorage<N>, to: &GaugeStorage<N>) {
        let value = from.value();
        *to.lock() = value;
    }

    // The difference of two gauges is the newer one.
    fn subtract_swap(&self, operand: &GaugeStorage<N>, argument: &GaugeStorage<N>) {
        self.copy(argument, operand);
    }

    fn has_change(&self, storage: &GaugeStorage<N>) -> bool {
        storage.lock().is_some()
    }

    fn to_aggregation(&self, storage: &GaugeStorage<N>) -> Aggregation {
        Aggregation::Gauge {
            value: storage.value().unwrap_or_default().to_number(),
        }
    }

    fn kind(&self) -> AggregationKind {
        AggregationKind::Gauge
    }
}
