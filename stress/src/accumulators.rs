/*
    Stress test for binding, updating and flushing accumulators while a
    collector drains the instrument.

    Run with:
    cargo run --release --bin accumulators -- [stateful|lowmemory]
*/

use lazy_static::lazy_static;
use opentelemetry::KeyValue;
use opentelemetry_viewstate::data::SequenceTracker;
use opentelemetry_viewstate::viewstate::{compile, Instrument};
use opentelemetry_viewstate::{
    AttributeSet, Descriptor, ExemplarBits, InstrumentKind, NumberKind, TemporalityPreference,
    View,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

mod throughput;

lazy_static! {
    static ref PREFERENCE: TemporalityPreference = match std::env::args().nth(1).as_deref() {
        Some("lowmemory") => TemporalityPreference::Delta,
        _ => TemporalityPreference::Cumulative,
    };
    static ref INSTRUMENT: Arc<dyn Instrument<i64>> = compile::<i64>(
        Descriptor::new("stress", InstrumentKind::Counter, NumberKind::I64),
        &View::default().with_temporality_preference(*PREFERENCE),
    )
    .expect("valid configuration");
    static ref TRACKER: SequenceTracker = SequenceTracker::default();
}

static ATTRIBUTE_VALUES: [&str; 10] = [
    "value1", "value2", "value3", "value4", "value5", "value6", "value7", "value8", "value9",
    "value10",
];

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn main() {
    println!("Temporality preference: {:?}", *PREFERENCE);
    throughput::test_throughput(test_accumulator, Some((Duration::from_millis(500), collect)));
}

fn test_accumulator() {
    let len = ATTRIBUTE_VALUES.len();
    let rands = CURRENT_RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        [
            rng.random_range(0..len),
            rng.random_range(0..len),
            rng.random_range(0..len),
        ]
    });

    // each attribute has 10 possible values, so there are 1000 possible combinations (time-series)
    let acc = INSTRUMENT.new_accumulator(AttributeSet::from([
        KeyValue::new("attribute1", ATTRIBUTE_VALUES[rands[0]]),
        KeyValue::new("attribute2", ATTRIBUTE_VALUES[rands[1]]),
        KeyValue::new("attribute3", ATTRIBUTE_VALUES[rands[2]]),
    ]));
    for _ in 0..10 {
        acc.update(1, ExemplarBits::default());
    }
    acc.snapshot_and_process(true);
}

fn collect() {
    let mut output = Vec::new();
    INSTRUMENT.collect(&TRACKER.next(SystemTime::now()), &mut output);
    let points: usize = output.iter().map(|i| i.points.len()).sum();
    println!(
        "Collected {} points, {} series retained",
        points,
        INSTRUMENT.in_memory_size()
    );
}
