use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::aggregator::{ExemplarBits, Methods};
use crate::number::Numeric;

use super::{Accumulator, NotUsed, SampleFilter, StorageHolder, Updater};

/// Buffers synchronous measurements for one bound timeseries.
///
/// `update` writes only to `current` and never takes a lock. A flush moves
/// `current` into `snapshot` and merges the snapshot into the shared holder.
pub(crate) struct SyncAccumulator<N, M: Methods<N>, F> {
    // Serializes flushes of this accumulator, the only writers of `snapshot`.
    sync_lock: Mutex<()>,
    current: M::Storage,
    snapshot: M::Storage,
    holder: Arc<StorageHolder<M::Storage, AtomicI64>>,
    methods: Arc<M>,
    _marker: PhantomData<fn(N) -> F>,
}

impl<N, M, F> SyncAccumulator<N, M, F>
where
    N: Numeric,
    M: Methods<N>,
    F: SampleFilter,
{
    /// Wraps a holder on which the caller already took a reference.
    pub(crate) fn new(methods: Arc<M>, holder: Arc<StorageHolder<M::Storage, AtomicI64>>) -> Self {
        SyncAccumulator {
            sync_lock: Mutex::new(()),
            current: methods.init(),
            snapshot: methods.init(),
            holder,
            methods,
            _marker: PhantomData,
        }
    }
}

impl<N, M, F> Accumulator for SyncAccumulator<N, M, F>
where
    N: Numeric,
    M: Methods<N>,
    F: SampleFilter,
{
    fn snapshot_and_process(&self, release: bool) {
        let _guard = self.sync_lock.lock().unwrap_or_else(|err| err.into_inner());

        self.methods.move_into(&self.current, &self.snapshot);
        self.methods.merge(&self.snapshot, &self.holder.storage);
        if release {
            // Published after the merge so a collector that sees zero
            // references also sees the merged value.
            self.holder.auxiliary.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl<N, M, F> Updater<N> for SyncAccumulator<N, M, F>
where
    N: Numeric,
    M: Methods<N>,
    F: SampleFilter,
{
    fn update(&self, value: N, exemplar: ExemplarBits) {
        self.methods.update(&self.current, value, exemplar);
    }

    fn may_sample(&self, is_traced: bool) -> bool {
        F::may_sample(is_traced)
    }
}

impl<N, M: Methods<N>, F> fmt::Debug for SyncAccumulator<N, M, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncAccumulator")
            .field("references", &self.holder.auxiliary.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Holds the most recent observation of an asynchronous instrument for one
/// timeseries.
pub(crate) struct AsyncAccumulator<N, M: Methods<N>> {
    current: Mutex<N>,
    holder: Arc<StorageHolder<M::Storage, NotUsed>>,
    methods: Arc<M>,
}

impl<N, M> AsyncAccumulator<N, M>
where
    N: Numeric,
    M: Methods<N>,
{
    pub(crate) fn new(methods: Arc<M>, holder: Arc<StorageHolder<M::Storage, NotUsed>>) -> Self {
        AsyncAccumulator {
            current: Mutex::new(N::default()),
            holder,
            methods,
        }
    }
}

impl<N, M> Accumulator for AsyncAccumulator<N, M>
where
    N: Numeric,
    M: Methods<N>,
{
    fn snapshot_and_process(&self, _release: bool) {
        let current = self.current.lock().unwrap_or_else(|err| err.into_inner());

        self.methods
            .update(&self.holder.storage, *current, ExemplarBits::default());
    }
}

impl<N, M> Updater<N> for AsyncAccumulator<N, M>
where
    N: Numeric,
    M: Methods<N>,
{
    fn update(&self, value: N, _exemplar: ExemplarBits) {
        *self.current.lock().unwrap_or_else(|err| err.into_inner()) = value;
    }

    // Observations carry no trace context.
    fn may_sample(&self, _is_traced: bool) -> bool {
        false
    }
}

impl<N: Numeric, M: Methods<N>> fmt::Debug for AsyncAccumulator<N, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncAccumulator")
            .field(
                "current",
                &*self.current.lock().unwrap_or_else(|err| err.into_inner()),
            )
            .finish_non_exhaustive()
    }
}

/// Broadcasts to the accumulators of several views of one instrument.
pub struct MultiAccumulator<N> {
    accumulators: Vec<Arc<dyn Updater<N>>>,
}

impl<N> MultiAccumulator<N> {
    /// Combines the given accumulators.
    pub fn new(accumulators: Vec<Arc<dyn Updater<N>>>) -> Self {
        MultiAccumulator { accumulators }
    }

    /// The number of accumulators combined.
    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    /// Whether no accumulators are combined.
    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }
}

impl<N: Numeric> Accumulator for MultiAccumulator<N> {
    fn snapshot_and_process(&self, release: bool) {
        for acc in &self.accumulators {
            acc.snapshot_and_process(release);
        }
    }
}

impl<N: Numeric> Updater<N> for MultiAccumulator<N> {
    fn update(&self, value: N, exemplar: ExemplarBits) {
        for acc in &self.accumulators {
            acc.update(value, exemplar);
        }
    }

    fn may_sample(&self, is_traced: bool) -> bool {
        self.accumulators
            .iter()
            .any(|acc| acc.may_sample(is_traced))
    }
}

impl<N> fmt::Debug for MultiAccumulator<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiAccumulator")
            .field("len", &self.accumulators.len())
            .finish()
    }
}
