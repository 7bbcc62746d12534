use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use opentelemetry::otel_debug;

use crate::aggregator::Methods;
use crate::attributes::{AttributeSet, KeysFilter, OVERFLOW_ATTRIBUTE_SET};
use crate::data::{self, Sequence, Temporality};
use crate::instrument::Descriptor;
use crate::number::Numeric;

use super::{
    Instrument, InstrumentBase, NotUsed, SampleFilter, StorageHolder, StorageMap, Updater,
};

/// Synchronous instrument reporting cumulative points.
///
/// Entries are never removed; memory grows with the number of distinct
/// attribute sets ever recorded.
pub(crate) struct StatefulSyncInstrument<N, M: Methods<N>, F> {
    base: InstrumentBase<N, M, AtomicI64>,
    _filter: PhantomData<fn() -> F>,
}

impl<N, M, F> StatefulSyncInstrument<N, M, F>
where
    N: Numeric,
    M: Methods<N>,
    F: SampleFilter,
{
    pub(crate) fn new(descriptor: Descriptor, methods: M, keys_filter: Option<KeysFilter>) -> Self {
        StatefulSyncInstrument {
            base: InstrumentBase::new(descriptor, methods, keys_filter),
            _filter: PhantomData,
        }
    }
}

impl<N, M, F> Instrument<N> for StatefulSyncInstrument<N, M, F>
where
    N: Numeric,
    M: Methods<N>,
    F: SampleFilter,
{
    fn descriptor(&self) -> &Descriptor {
        self.base.descriptor()
    }

    fn new_accumulator(&self, attrs: AttributeSet) -> Arc<dyn Updater<N>> {
        self.base.new_sync_accumulator::<F>(attrs)
    }

    fn collect(&self, seq: &Sequence, output: &mut Vec<data::Instrument>) {
        let data = self.base.lock();
        let ioutput = self.base.append_instrument(output, data.len());

        for (set, entry) in data.iter() {
            ioutput.points.push(self.base.point(
                set,
                &entry.storage,
                Temporality::Cumulative,
                seq.start,
                seq.now,
            ));
        }
    }

    fn in_memory_size(&self) -> usize {
        self.base.size()
    }
}

/// Synchronous instrument reporting delta points.
///
/// An entry is dropped at the first collection that finds it unchanged with
/// no accumulator bound to it.
pub(crate) struct LowMemorySyncInstrument<N, M: Methods<N>, F> {
    base: InstrumentBase<N, M, AtomicI64>,
    _filter: PhantomData<fn() -> F>,
}

impl<N, M, F> LowMemorySyncInstrument<N, M, F>
where
    N: Numeric,
    M: Methods<N>,
    F: SampleFilter,
{
    pub(crate) fn new(descriptor: Descriptor, methods: M, keys_filter: Option<KeysFilter>) -> Self {
        LowMemorySyncInstrument {
            base: InstrumentBase::new(descriptor, methods, keys_filter),
            _filter: PhantomData,
        }
    }
}

impl<N, M, F> Instrument<N> for LowMemorySyncInstrument<N, M, F>
where
    N: Numeric,
    M: Methods<N>,
    F: SampleFilter,
{
    fn descriptor(&self) -> &Descriptor {
        self.base.descriptor()
    }

    fn new_accumulator(&self, attrs: AttributeSet) -> Arc<dyn Updater<N>> {
        self.base.new_sync_accumulator::<F>(attrs)
    }

    fn collect(&self, seq: &Sequence, output: &mut Vec<data::Instrument>) {
        let mut data = self.base.lock();
        let ioutput = self.base.append_instrument(output, data.len());
        let methods = self.base.methods();
        let mut removed = 0_usize;
        // move_into overwrites its target, so one scratch storage serves
        // every entry
        let delta = methods.init();

        data.retain(|set, entry| {
            // Read before the move below. Binding needs the instrument lock,
            // which we hold, so zero here means no writer can appear.
            let refs = entry.auxiliary.load(Ordering::Acquire);

            methods.move_into(&entry.storage, &delta);

            if methods.has_change(&delta) {
                ioutput.points.push(self.base.point(
                    set,
                    &delta,
                    Temporality::Delta,
                    seq.last,
                    seq.now,
                ));
                return true;
            }
            if refs == 0 {
                removed += 1;
                return false;
            }
            true
        });

        if removed > 0 {
            otel_debug!(
                name: "ViewState.TimeseriesRemoved",
                instrument_name = self.base.descriptor().name(),
                count = removed,
            );
        }
    }

    fn in_memory_size(&self) -> usize {
        self.base.size()
    }
}

/// Asynchronous instrument reporting the observations of the latest cycle
/// as cumulative points.
///
/// The map is discarded after every collection.
pub(crate) struct LowMemoryAsyncInstrument<N, M: Methods<N>> {
    base: InstrumentBase<N, M, NotUsed>,
}

impl<N, M> LowMemoryAsyncInstrument<N, M>
where
    N: Numeric,
    M: Methods<N>,
{
    pub(crate) fn new(descriptor: Descriptor, methods: M, keys_filter: Option<KeysFilter>) -> Self {
        LowMemoryAsyncInstrument {
            base: InstrumentBase::new(descriptor, methods, keys_filter),
        }
    }
}

impl<N, M> Instrument<N> for LowMemoryAsyncInstrument<N, M>
where
    N: Numeric,
    M: Methods<N>,
{
    fn descriptor(&self) -> &Descriptor {
        self.base.descriptor()
    }

    fn new_accumulator(&self, attrs: AttributeSet) -> Arc<dyn Updater<N>> {
        self.base.new_async_accumulator(attrs)
    }

    fn collect(&self, seq: &Sequence, output: &mut Vec<data::Instrument>) {
        let mut data = self.base.lock();
        let ioutput = self.base.append_instrument(output, data.len());

        for (set, entry) in data.iter() {
            ioutput.points.push(self.base.point(
                set,
                &entry.storage,
                Temporality::Cumulative,
                seq.start,
                seq.now,
            ));
        }

        // Release the capacity as well as the entries.
        *data = StorageMap::default();
    }

    fn in_memory_size(&self) -> usize {
        self.base.size()
    }
}

/// Asynchronous instrument turning cumulative observations into delta
/// points by remembering the previous cycle.
///
/// A timeseries observed in the prior cycle but not in the current one is
/// forgotten. If it reappears later its first delta is computed against zero.
pub(crate) struct StatefulAsyncInstrument<N, M: Methods<N>> {
    base: InstrumentBase<N, M, NotUsed>,
    // Locked only while the instrument lock is held.
    prior: Mutex<StorageMap<M::Storage, NotUsed>>,
}

impl<N, M> StatefulAsyncInstrument<N, M>
where
    N: Numeric,
    M: Methods<N>,
{
    pub(crate) fn new(descriptor: Descriptor, methods: M, keys_filter: Option<KeysFilter>) -> Self {
        StatefulAsyncInstrument {
            base: InstrumentBase::new(descriptor, methods, keys_filter),
            prior: Mutex::new(StorageMap::default()),
        }
    }

    fn lock_prior(&self) -> MutexGuard<'_, StorageMap<M::Storage, NotUsed>> {
        self.prior.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl<N, M> Instrument<N> for StatefulAsyncInstrument<N, M>
where
    N: Numeric,
    M: Methods<N>,
{
    fn descriptor(&self) -> &Descriptor {
        self.base.descriptor()
    }

    fn new_accumulator(&self, attrs: AttributeSet) -> Arc<dyn Updater<N>> {
        self.base.new_async_accumulator(attrs)
    }

    fn collect(&self, seq: &Sequence, output: &mut Vec<data::Instrument>) {
        let mut data = self.base.lock();
        let mut prior = self.lock_prior();
        let ioutput = self.base.append_instrument(output, data.len());
        let methods = self.base.methods();

        for (set, entry) in data.iter() {
            let delta = match prior.get(set) {
                Some(pval) => {
                    // pval := entry - pval
                    methods.subtract_swap(&pval.storage, &entry.storage);
                    if !methods.has_change(&pval.storage) {
                        continue;
                    }
                    &pval.storage
                }
                None => &entry.storage,
            };
            ioutput.points.push(self.base.point(
                set,
                delta,
                Temporality::Delta,
                seq.last,
                seq.now,
            ));
        }

        *prior = mem::take(&mut *data);

        // Series folded into the overflow set are not observed again next
        // cycle, so its value is carried forward.
        if let Some(overflow) = prior.get(&*OVERFLOW_ATTRIBUTE_SET) {
            let carried = StorageHolder {
                storage: methods.init(),
                auxiliary: NotUsed,
            };
            methods.copy(&overflow.storage, &carried.storage);
            data.insert(OVERFLOW_ATTRIBUTE_SET.clone(), Arc::new(carried));

            otel_debug!(
                name: "ViewState.OverflowCarriedForward",
                instrument_name = self.base.descriptor().name(),
            );
        }
    }

    fn in_memory_size(&self) -> usize {
        let _data = self.base.lock();
        self.lock_prior().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{ExemplarBits, HistogramMethods, SumMethods};
    use crate::data::Aggregation;
    use crate::instrument::InstrumentKind;
    use crate::number::{Number, NumberKind};
    use crate::viewstate::TraceBasedFilter;
    use opentelemetry::KeyValue;
    use std::time::{Duration, SystemTime};

    fn sequence(cycle: u64) -> Sequence {
        let start = SystemTime::UNIX_EPOCH;
        Sequence {
            start,
            last: start + Duration::from_secs(cycle),
            now: start + Duration::from_secs(cycle + 1),
        }
    }

    fn observable_counter() -> StatefulAsyncInstrument<i64, SumMethods<i64>> {
        StatefulAsyncInstrument::new(
            Descriptor::new("ops", InstrumentKind::ObservableCounter, NumberKind::I64),
            SumMethods::new(true),
            None,
        )
    }

    fn observe(inst: &dyn Instrument<i64>, attrs: AttributeSet, value: i64) {
        let acc = inst.new_accumulator(attrs);
        acc.update(value, ExemplarBits::default());
        acc.snapshot_and_process(true);
    }

    fn collect(inst: &dyn Instrument<i64>, cycle: u64) -> data::Instrument {
        let mut output = Vec::new();
        inst.collect(&sequence(cycle), &mut output);
        assert_eq!(output.len(), 1);
        output.remove(0)
    }

    #[test]
    fn overflow_value_is_copied_into_next_cycle() {
        let inst = observable_counter();
        observe(&inst, OVERFLOW_ATTRIBUTE_SET.clone(), 10);

        let out = collect(&inst, 0);
        assert_eq!(out.points.len(), 1);

        let data = inst.base.lock();
        let carried = data
            .get(&*OVERFLOW_ATTRIBUTE_SET)
            .expect("overflow entry carried forward");
        assert_eq!(carried.storage.value(), 10);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn carried_overflow_without_new_observations_reports_nothing() {
        let inst = observable_counter();
        observe(&inst, OVERFLOW_ATTRIBUTE_SET.clone(), 10);
        collect(&inst, 0);

        let out = collect(&inst, 1);
        assert!(out.points.is_empty());
    }

    #[test]
    fn regular_series_are_not_carried() {
        let inst = observable_counter();
        observe(&inst, AttributeSet::from([KeyValue::new("a", 1_i64)]), 3);
        collect(&inst, 0);

        assert_eq!(inst.base.lock().len(), 0);
        assert_eq!(inst.in_memory_size(), 1);
    }

    #[test]
    fn low_memory_sync_keeps_referenced_entries() {
        let inst: LowMemorySyncInstrument<i64, SumMethods<i64>, TraceBasedFilter> =
            LowMemorySyncInstrument::new(
                Descriptor::new("requests", InstrumentKind::Counter, NumberKind::I64),
                SumMethods::new(true),
                None,
            );
        let attrs = AttributeSet::from([KeyValue::new("route", "/")]);
        let acc = inst.new_accumulator(attrs.clone());
        acc.update(2, ExemplarBits::default());
        acc.snapshot_and_process(false);

        let out = collect(&inst, 0);
        assert_eq!(
            out.points[0].aggregation,
            Aggregation::Sum {
                value: Number::from_i64(2),
                monotonic: true
            }
        );

        // unchanged but still bound
        let out = collect(&inst, 1);
        assert!(out.points.is_empty());
        assert_eq!(inst.in_memory_size(), 1);

        acc.snapshot_and_process(true);
        collect(&inst, 2);
        assert_eq!(inst.in_memory_size(), 0);
    }

    #[test]
    fn low_memory_sync_points_do_not_share_scratch_state() {
        let inst: LowMemorySyncInstrument<i64, HistogramMethods<i64>, TraceBasedFilter> =
            LowMemorySyncInstrument::new(
                Descriptor::new("latency", InstrumentKind::Histogram, NumberKind::I64),
                HistogramMethods::new(vec![10.0]).unwrap(),
                None,
            );
        let series = [("a", vec![1, 2]), ("b", vec![50]), ("c", vec![3, 4, 30])];
        for (route, values) in &series {
            let acc = inst.new_accumulator(AttributeSet::from([KeyValue::new("route", *route)]));
            for v in values {
                acc.update(*v, ExemplarBits::default());
            }
            acc.snapshot_and_process(true);
        }

        let out = collect(&inst, 0);
        assert_eq!(out.points.len(), series.len());
        for (route, values) in &series {
            let attrs = AttributeSet::from([KeyValue::new("route", *route)]);
            let point = out
                .points
                .iter()
                .find(|p| p.attributes == attrs)
                .expect("one point per series");
            let Aggregation::Histogram(hist) = &point.aggregation else {
                panic!("expected a histogram");
            };
            assert_eq!(hist.count, values.len() as u64);
            assert_eq!(hist.sum.to_i64(), values.iter().sum::<i64>());
        }

        let out = collect(&inst, 1);
        assert!(out.points.is_empty());
        assert_eq!(inst.in_memory_size(), 0);
    }
}
