use std::sync::Arc;

use opentelemetry::otel_debug;

use crate::aggregator::{
    AggregationKind, GaugeMethods, HistogramMethods, Methods, SumMethods,
    DEFAULT_HISTOGRAM_BOUNDS,
};
use crate::attributes::{AttributeSet, KeysFilter};
use crate::data::Temporality;
use crate::error::{MetricError, MetricResult};
use crate::instrument::{Descriptor, InstrumentKind};
use crate::number::Numeric;
use crate::view::{ExemplarFilter, View};

use super::accumulators::MultiAccumulator;
use super::collectors::{
    LowMemoryAsyncInstrument, LowMemorySyncInstrument, StatefulAsyncInstrument,
    StatefulSyncInstrument,
};
use super::{AlwaysOffFilter, AlwaysOnFilter, Instrument, SampleFilter, TraceBasedFilter, Updater};

/// Builds the state for one view of an instrument.
///
/// The aggregation defaults from the instrument kind when the view does not
/// set one. The variant follows from the instrument kind and the temporality
/// the view's preference assigns it:
///
/// * synchronous, delta: low-memory sync
/// * synchronous, cumulative: stateful sync
/// * asynchronous, delta, not a gauge: stateful async
/// * asynchronous otherwise: low-memory async
///
/// # Errors
///
/// Fails when `N` does not match the descriptor's number kind, when a
/// histogram is requested for an asynchronous instrument, or when the
/// histogram bounds are invalid.
pub fn compile<N: Numeric>(
    descriptor: Descriptor,
    view: &View,
) -> MetricResult<Arc<dyn Instrument<N>>> {
    if descriptor.number_kind() != N::KIND {
        return Err(MetricError::InvalidInstrumentConfiguration(
            "number kind does not match the descriptor",
        ));
    }

    let kind = descriptor.instrument_kind();
    let aggregation = view
        .aggregation()
        .cloned()
        .unwrap_or_else(|| default_aggregation(kind));

    match aggregation {
        AggregationKind::Sum => Ok(build(descriptor, SumMethods::new(kind.monotonic()), view)),
        AggregationKind::Gauge => Ok(build(descriptor, GaugeMethods::new(), view)),
        AggregationKind::Histogram { boundaries } => {
            if kind.asynchronous() {
                return Err(MetricError::InvalidInstrumentConfiguration(
                    "histogram aggregation requires a synchronous instrument",
                ));
            }
            let methods = HistogramMethods::new(boundaries)?;
            Ok(build(descriptor, methods, view))
        }
    }
}

/// Combines the accumulators of several views of one instrument.
///
/// A single instrument yields its own accumulator without wrapping.
pub fn new_multi_accumulator<N: Numeric>(
    instruments: &[Arc<dyn Instrument<N>>],
    attrs: AttributeSet,
) -> Arc<dyn Updater<N>> {
    if let [instrument] = instruments {
        return instrument.new_accumulator(attrs);
    }
    Arc::new(MultiAccumulator::new(
        instruments
            .iter()
            .map(|inst| inst.new_accumulator(attrs.clone()))
            .collect(),
    ))
}

fn default_aggregation(kind: InstrumentKind) -> AggregationKind {
    match kind {
        InstrumentKind::Counter
        | InstrumentKind::UpDownCounter
        | InstrumentKind::ObservableCounter
        | InstrumentKind::ObservableUpDownCounter => AggregationKind::Sum,
        InstrumentKind::Gauge | InstrumentKind::ObservableGauge => AggregationKind::Gauge,
        InstrumentKind::Histogram => AggregationKind::Histogram {
            boundaries: DEFAULT_HISTOGRAM_BOUNDS.to_vec(),
        },
    }
}

fn build<N, M>(descriptor: Descriptor, methods: M, view: &View) -> Arc<dyn Instrument<N>>
where
    N: Numeric,
    M: Methods<N>,
{
    let kind = descriptor.instrument_kind();
    let temporality = view.temporality_preference().temporality_for(kind);
    let keys_filter = view.keys_filter().cloned();
    let delta = temporality == Temporality::Delta;
    let stateful_async = delta && !matches!(methods.kind(), AggregationKind::Gauge);

    let collector = match (kind.synchronous(), delta, stateful_async) {
        (true, true, _) => "lowmemory_sync",
        (true, false, _) => "stateful_sync",
        (false, _, true) => "stateful_async",
        (false, _, false) => "lowmemory_async",
    };
    otel_debug!(
        name: "ViewState.InstrumentCompiled",
        instrument_name = descriptor.name(),
        collector = collector,
    );

    if kind.synchronous() {
        match view.exemplar_filter() {
            ExemplarFilter::AlwaysOn => {
                build_sync::<N, M, AlwaysOnFilter>(descriptor, methods, keys_filter, temporality)
            }
            ExemplarFilter::AlwaysOff => {
                build_sync::<N, M, AlwaysOffFilter>(descriptor, methods, keys_filter, temporality)
            }
            ExemplarFilter::TraceBased => {
                build_sync::<N, M, TraceBasedFilter>(descriptor, methods, keys_filter, temporality)
            }
        }
    } else if stateful_async {
        Arc::new(StatefulAsyncInstrument::new(descriptor, methods, keys_filter))
    } else {
        Arc::new(LowMemoryAsyncInstrument::new(descriptor, methods, keys_filter))
    }
}

fn build_sync<N, M, F>(
    descriptor: Descriptor,
    methods: M,
    keys_filter: Option<KeysFilter>,
    temporality: Temporality,
) -> Arc<dyn Instrument<N>>
where
    N: Numeric,
    M: Methods<N>,
    F: SampleFilter,
{
    match temporality {
        Temporality::Delta => Arc::new(LowMemorySyncInstrument::<N, M, F>::new(
            descriptor,
            methods,
            keys_filter,
        )),
        Temporality::Cumulative => Arc::new(StatefulSyncInstrument::<N, M, F>::new(
            descriptor,
            methods,
            keys_filter,
        )),
    }
}
