//! Per-view instrument state.
//!
//! Every compiled view owns one [`Instrument`]: a map from [`AttributeSet`]
//! to a storage holder, guarded by the *instrument lock*. Measurements reach
//! a holder through short-lived [`Accumulator`]s which buffer updates
//! privately and merge them into the shared holder on
//! [`Accumulator::snapshot_and_process`]. At each collection the instrument
//! walks its map and produces points with the temporality and retention
//! policy of its variant:
//!
//! | Variant | Temporality | Entry lifetime |
//! |---|---|---|
//! | stateful sync | cumulative | kept forever |
//! | low-memory sync | delta | removed once unreferenced and unchanged |
//! | low-memory async | cumulative | map discarded every cycle |
//! | stateful async | delta | map becomes the prior map every cycle |
//!
//! The instrument lock is held to insert, remove or scan entries and to take
//! a reference on a synchronous holder. It is never held while an
//! accumulator merges into a holder: the [`Methods`] storage synchronizes
//! those merges itself.
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use crate::aggregator::{ExemplarBits, Methods};
use crate::attributes::{AttributeSet, KeysFilter};
use crate::data::{self, Point, Sequence, Temporality};
use crate::instrument::Descriptor;
use crate::number::Numeric;

mod accumulators;
mod collectors;
mod compile;
mod sample;

pub use accumulators::MultiAccumulator;
pub use compile::{compile, new_multi_accumulator};
pub use sample::{AlwaysOffFilter, AlwaysOnFilter, SampleFilter, TraceBasedFilter};

/// The write side of a timeseries, flushed once per collection cycle.
pub trait Accumulator: Send + Sync {
    /// Merges everything buffered since the previous call into the shared
    /// storage.
    ///
    /// Pass `release = true` on the final call; the accumulator must not be
    /// used afterwards. Synchronous instruments only prune a timeseries once
    /// every accumulator bound to it has been released.
    fn snapshot_and_process(&self, release: bool);
}

/// An [`Accumulator`] that accepts measurements of type `N`.
pub trait Updater<N>: Accumulator {
    /// Records one measurement. Never allocates.
    fn update(&self, value: N, exemplar: ExemplarBits);

    /// Whether a measurement made with the given trace state may be kept as
    /// an exemplar.
    fn may_sample(&self, is_traced: bool) -> bool;
}

/// One compiled view of an instrument.
pub trait Instrument<N>: Send + Sync {
    /// The instrument this state belongs to.
    fn descriptor(&self) -> &Descriptor;

    /// Binds a new accumulator to the timeseries for `attrs`, creating the
    /// timeseries if needed.
    fn new_accumulator(&self, attrs: AttributeSet) -> Arc<dyn Updater<N>>;

    /// Appends one [`data::Instrument`] holding this cycle's points to
    /// `output`.
    fn collect(&self, seq: &Sequence, output: &mut Vec<data::Instrument>);

    /// The number of timeseries currently retained.
    fn in_memory_size(&self) -> usize;
}

/// Auxiliary field of asynchronous holders.
#[derive(Debug, Default)]
pub(crate) struct NotUsed;

/// Owns the aggregation state of one timeseries.
///
/// For synchronous instruments `auxiliary` counts the accumulators bound to
/// the holder.
#[derive(Debug)]
pub(crate) struct StorageHolder<S, A> {
    pub(crate) storage: S,
    pub(crate) auxiliary: A,
}

pub(crate) type StorageMap<S, A> = HashMap<AttributeSet, Arc<StorageHolder<S, A>>>;

/// State and helpers shared by all instrument variants.
pub(crate) struct InstrumentBase<N, M: Methods<N>, A> {
    descriptor: Descriptor,
    methods: Arc<M>,
    keys_filter: Option<KeysFilter>,
    data: Mutex<StorageMap<M::Storage, A>>,
    _number: PhantomData<fn(N)>,
}

impl<N, M, A> InstrumentBase<N, M, A>
where
    N: Numeric,
    M: Methods<N>,
    A: Default,
{
    pub(crate) fn new(descriptor: Descriptor, methods: M, keys_filter: Option<KeysFilter>) -> Self {
        InstrumentBase {
            descriptor,
            methods: Arc::new(methods),
            keys_filter,
            data: Mutex::new(HashMap::new()),
            _number: PhantomData,
        }
    }

    pub(crate) fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub(crate) fn methods(&self) -> &M {
        &self.methods
    }

    /// Acquires the instrument lock.
    ///
    /// Every critical section leaves the map consistent, so a poisoned lock
    /// is still safe to use.
    pub(crate) fn lock(&self) -> MutexGuard<'_, StorageMap<M::Storage, A>> {
        self.data.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn apply_keys_filter(&self, attrs: AttributeSet) -> AttributeSet {
        match &self.keys_filter {
            Some(filter) => filter.apply(attrs),
            None => attrs,
        }
    }

    /// Looks up the holder for an already filtered set, creating it with
    /// zeroed storage if needed. Must be called with the instrument lock held.
    fn get_or_create_entry(
        &self,
        data: &mut StorageMap<M::Storage, A>,
        attrs: AttributeSet,
    ) -> Arc<StorageHolder<M::Storage, A>> {
        data.entry(attrs)
            .or_insert_with(|| {
                Arc::new(StorageHolder {
                    storage: self.methods.init(),
                    auxiliary: A::default(),
                })
            })
            .clone()
    }

    /// Starts this instrument's output record for the current cycle.
    pub(crate) fn append_instrument<'a>(
        &self,
        output: &'a mut Vec<data::Instrument>,
        capacity: usize,
    ) -> &'a mut data::Instrument {
        output.push(data::Instrument {
            descriptor: self.descriptor.clone(),
            points: Vec::with_capacity(capacity),
        });
        let last = output.len() - 1;
        &mut output[last]
    }

    pub(crate) fn point(
        &self,
        attributes: &AttributeSet,
        storage: &M::Storage,
        temporality: Temporality,
        start: SystemTime,
        end: SystemTime,
    ) -> Point {
        Point {
            attributes: attributes.clone(),
            aggregation: self.methods.to_aggregation(storage),
            temporality,
            start,
            end,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.lock().len()
    }
}

impl<N, M> InstrumentBase<N, M, AtomicI64>
where
    N: Numeric,
    M: Methods<N>,
{
    /// Locates the holder for `attrs` and takes a reference on it.
    ///
    /// The reference is taken under the instrument lock so a concurrent
    /// low-memory collection cannot prune the holder in between.
    pub(crate) fn find_storage(
        &self,
        attrs: AttributeSet,
    ) -> Arc<StorageHolder<M::Storage, AtomicI64>> {
        let attrs = self.apply_keys_filter(attrs);

        let mut data = self.lock();
        let entry = self.get_or_create_entry(&mut data, attrs);
        entry.auxiliary.fetch_add(1, Ordering::AcqRel);
        entry
    }

    pub(crate) fn new_sync_accumulator<F: SampleFilter>(
        &self,
        attrs: AttributeSet,
    ) -> Arc<dyn Updater<N>> {
        let holder = self.find_storage(attrs);
        Arc::new(accumulators::SyncAccumulator::<N, M, F>::new(
            Arc::clone(&self.methods),
            holder,
        ))
    }
}

impl<N, M> InstrumentBase<N, M, NotUsed>
where
    N: Numeric,
    M: Methods<N>,
{
    /// Locates the holder for `attrs`.
    pub(crate) fn find_storage(
        &self,
        attrs: AttributeSet,
    ) -> Arc<StorageHolder<M::Storage, NotUsed>> {
        let attrs = self.apply_keys_filter(attrs);

        let mut data = self.lock();
        self.get_or_create_entry(&mut data, attrs)
    }

    pub(crate) fn new_async_accumulator(&self, attrs: AttributeSet) -> Arc<dyn Updater<N>> {
        let holder = self.find_storage(attrs);
        Arc::new(accumulators::AsyncAccumulator::<N, M>::new(
            Arc::clone(&self.methods),
            holder,
        ))
    }
}
