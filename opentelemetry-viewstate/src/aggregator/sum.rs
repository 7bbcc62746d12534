use std::fmt;
use std::marker::PhantomData;

use crate::data::Aggregation;
use crate::number::{AtomicNumber, Numeric};

use super::{AggregationKind, ExemplarBits, Methods};

/// Storage for a running sum.
pub struct SumStorage<N: Numeric> {
    value: N::Atomic,
}

impl<N: Numeric> SumStorage<N> {
    /// The current sum.
    pub fn value(&self) -> N {
        self.value.load()
    }
}

impl<N: Numeric> fmt::Debug for SumStorage<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SumStorage")
            .field("value", &self.value())
            .finish()
    }
}

/// Summarizes a set of measurements as their arithmetic sum.
///
/// All operations are lock-free.
pub struct SumMethods<N> {
    monotonic: bool,
    _number: PhantomData<fn(N)>,
}

impl<N> SumMethods<N> {
    /// Creates the sum algebra.
    pub fn new(monotonic: bool) -> Self {
        SumMethods {
            monotonic,
            _number: PhantomData,
        }
    }

    /// Whether the sum is reported as non-decreasing.
    pub fn monotonic(&self) -> bool {
        self.monotonic
    }
}

impl<N> fmt::Debug for SumMethods<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SumMethods")
            .field("monotonic", &self.monotonic)
            .finish()
    }
}

impl<N: Numeric> Methods<N> for SumMethods<N> {
    type Storage = SumStorage<N>;

    fn init(&self) -> SumStorage<N> {
        SumStorage {
            value: N::Atomic::default(),
        }
    }

    fn update(&self, storage: &SumStorage<N>, value: N, _exemplar: ExemplarBits) {
        storage.value.add(value);
    }

    fn merge(&self, from: &SumStorage<N>, to: &SumStorage<N>) {
        to.value.add(from.value.load());
    }

    fn move_into(&self, from: &SumStorage<N>, to: &SumStorage<N>) {
        to.value.store(from.value.swap(N::default()));
    }

    fn copy(&self, from: &SumStorage<N>, to: &SumStorage<N>) {
        to.value.store(from.value.load());
    }

    fn subtract_swap(&self, operand: &SumStorage<N>, argument: &SumStorage<N>) {
        operand
            .value
            .store(argument.value.load().wrapping_sub(operand.value.load()));
    }

    fn has_change(&self, storage: &SumStorage<N>) -> bool {
        storage.value.load() != N::default()
    }

    fn to_aggregation(&self, storage: &SumStorage<N>) -> Aggregation {
        Aggregation::Sum {
            value: storage.value.load().to_number(),
            monotonic: self.monotonic,
        }
    }

    fn kind(&self) -> AggregationKind {
        AggregationKind::Sum
    }
}
