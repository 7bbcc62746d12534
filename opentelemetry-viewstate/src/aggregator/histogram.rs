use std::fmt;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard};

use crate::data::{Aggregation, HistogramPoint};
use crate::error::{MetricError, MetricResult};
use crate::number::Numeric;

use super::{AggregationKind, ExemplarBits, Methods};

/// Bucket boundaries used when a view does not configure any.
pub const DEFAULT_HISTOGRAM_BOUNDS: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0,
    10000.0,
];

#[derive(Debug)]
struct Buckets<N> {
    counts: Vec<u64>,
    count: u64,
    total: N,
    min: Option<N>,
    max: Option<N>,
}

impl<N: Numeric> Buckets<N> {
    /// returns buckets with `n` bins.
    fn new(n: usize) -> Buckets<N> {
        Buckets {
            counts: vec![0; n],
            count: 0,
            total: N::default(),
            min: None,
            max: None,
        }
    }

    fn bin(&mut self, idx: usize, value: N) {
        self.counts[idx] += 1;
        self.count += 1;
        self.total = self.total.wrapping_add(value);
        if self.min.map_or(true, |min| value < min) {
            self.min = Some(value);
        }
        if self.max.map_or(true, |max| value > max) {
            self.max = Some(value);
        }
    }

    fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.count = 0;
        self.total = N::default();
        self.min = None;
        self.max = None;
    }

    fn merge_from(&mut self, other: &Buckets<N>) {
        for (count, other) in self.counts.iter_mut().zip(&other.counts) {
            *count += other;
        }
        self.count += other.count;
        self.total = self.total.wrapping_add(other.total);
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(if b < a { b } else { a }),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(if b > a { b } else { a }),
            (a, b) => a.or(b),
        };
    }

    fn copy_from(&mut self, other: &Buckets<N>) {
        self.counts.copy_from_slice(&other.counts);
        self.count = other.count;
        self.total = other.total;
        self.min = other.min;
        self.max = other.max;
    }
}

/// Storage for an explicit bucket histogram.
pub struct HistogramStorage<N> {
    buckets: Mutex<Buckets<N>>,
}

impl<N> HistogramStorage<N> {
    fn lock(&self) -> MutexGuard<'_, Buckets<N>> {
        self.buckets.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl<N: Numeric> HistogramStorage<N> {
    /// The number of measurements recorded.
    pub fn count(&self) -> u64 {
        self.lock().count
    }

    /// The sum of measurements recorded.
    pub fn sum(&self) -> N {
        self.lock().total
    }
}

impl<N: fmt::Debug> fmt::Debug for HistogramStorage<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramStorage")
            .field("buckets", &*self.lock())
            .finish()
    }
}

/// Summarizes a set of measurements as a histogram with explicitly defined
/// buckets.
///
/// Storages are guarded by their own mutex; `update` only takes that lock.
pub struct HistogramMethods<N> {
    bounds: Vec<f64>,
    _number: PhantomData<fn(N)>,
}

impl<N> HistogramMethods<N> {
    /// Creates a histogram with the given upper bounds.
    ///
    /// Bounds must be finite and strictly increasing.
    pub fn new(bounds: Vec<f64>) -> MetricResult<Self> {
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(MetricError::Config(
                "histogram bounds must be finite".into(),
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MetricError::Config(format!(
                "histogram bounds must be strictly increasing: {bounds:?}"
            )));
        }
        Ok(HistogramMethods {
            bounds,
            _number: PhantomData,
        })
    }

    /// The upper bounds of the buckets.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }
}

impl<N> fmt::Debug for HistogramMethods<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramMethods")
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl<N: Numeric> Methods<N> for HistogramMethods<N> {
    type Storage = HistogramStorage<N>;

    fn init(&self) -> HistogramStorage<N> {
        HistogramStorage {
            buckets: Mutex::new(Buckets::new(self.bounds.len() + 1)),
        }
    }

    fn update(&self, storage: &HistogramStorage<N>, value: N, _exemplar: ExemplarBits) {
        let f = value.into_float();
        // Ignore NaN and infinity.
        if f.is_infinite() || f.is_nan() {
            return;
        }
        // This search will return an index in the range `[0, bounds.len()]`, where
        // it will return `bounds.len()` if value is greater than the last element
        // of `bounds`. This aligns with the buckets in that the length of buckets
        // is `bounds.len()+1`, with the last bucket representing:
        // `(bounds[bounds.len()-1], +∞)`.
        let index = self.bounds.partition_point(|&x| x < f);
        storage.lock().bin(index, value);
    }

    fn merge(&self, from: &HistogramStorage<N>, to: &HistogramStorage<N>) {
        let from = from.lock();
        to.lock().merge_from(&from);
    }

    fn move_into(&self, from: &HistogramStorage<N>, to: &HistogramStorage<N>) {
        let mut from = from.lock();
        to.lock().copy_from(&from);
        from.reset();
    }

    fn copy(&self, from: &HistogramStorage<N>, to: &HistogramStorage<N>) {
        let from = from.lock();
        to.lock().copy_from(&from);
    }

    fn subtract_swap(&self, operand: &HistogramStorage<N>, argument: &HistogramStorage<N>) {
        let argument = argument.lock();
        let mut operand = operand.lock();
        for (count, arg) in operand.counts.iter_mut().zip(&argument.counts) {
            *count = arg.wrapping_sub(*count);
        }
        operand.count = argument.count.wrapping_sub(operand.count);
        operand.total = argument.total.wrapping_sub(operand.total);
        // extrema of a difference are unknown
        operand.min = None;
        operand.max = None;
    }

    fn has_change(&self, storage: &HistogramStorage<N>) -> bool {
        storage.lock().count != 0
    }

    fn to_aggregation(&self, storage: &HistogramStorage<N>) -> Aggregation {
        let b = storage.lock();
        Aggregation::Histogram(HistogramPoint {
            count: b.count,
            sum: b.total.to_number(),
            min: b.min.map(Numeric::to_number),
            max: b.max.map(Numeric::to_number),
            bounds: self.bounds.clone(),
            bucket_counts: b.counts.clone(),
        })
    }

    fn kind(&self) -> AggregationKind {
        AggregationKind::Histogram {
            boundaries: self.bounds.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;
    use rstest::rstest;

    fn record(methods: &HistogramMethods<f64>, storage: &HistogramStorage<f64>, values: &[f64]) {
        for v in values {
            methods.update(storage, *v, ExemplarBits::default());
        }
    }

    #[rstest]
    #[case(vec![2.0, 4.0, 1.0], 1.0, 4.0, 7.0, 3)]
    #[case(vec![2.0, 4.0, 1.0, f64::INFINITY], 1.0, 4.0, 7.0, 3)]
    #[case(vec![2.0, 4.0, 1.0, -f64::INFINITY], 1.0, 4.0, 7.0, 3)]
    #[case(vec![2.0, f64::NAN, 4.0, 1.0], 1.0, 4.0, 7.0, 3)]
    #[case(vec![4.0, 4.0, 4.0, 2.0, 16.0, 1.0], 1.0, 16.0, 31.0, 6)]
    fn when_f64_is_nan_or_infinity_then_ignore(
        #[case] values: Vec<f64>,
        #[case] min: f64,
        #[case] max: f64,
        #[case] sum: f64,
        #[case] count: u64,
    ) {
        let methods = HistogramMethods::<f64>::new(vec![]).unwrap();
        let storage = methods.init();
        record(&methods, &storage, &values);

        let Aggregation::Histogram(point) = methods.to_aggregation(&storage) else {
            panic!("expected a histogram");
        };
        assert_eq!(point.min, Some(Number::from_f64(min)));
        assert_eq!(point.max, Some(Number::from_f64(max)));
        assert_eq!(point.sum.to_f64(), sum);
        assert_eq!(point.count, count);
    }

    #[test]
    fn values_land_in_upper_inclusive_buckets() {
        let methods = HistogramMethods::<f64>::new(vec![1.0, 5.0]).unwrap();
        let storage = methods.init();
        record(&methods, &storage, &[0.5, 1.0, 3.0, 5.0, 7.0]);

        let Aggregation::Histogram(point) = methods.to_aggregation(&storage) else {
            panic!("expected a histogram");
        };
        assert_eq!(point.bucket_counts, vec![2, 2, 1]);
        assert_eq!(point.bounds, vec![1.0, 5.0]);
    }

    #[rstest]
    #[case(vec![1.0, 1.0])]
    #[case(vec![5.0, 1.0])]
    #[case(vec![1.0, f64::NAN])]
    #[case(vec![f64::INFINITY])]
    fn invalid_bounds_are_rejected(#[case] bounds: Vec<f64>) {
        assert!(matches!(
            HistogramMethods::<i64>::new(bounds),
            Err(MetricError::Config(_))
        ));
    }

    #[test]
    fn subtract_swap_differences_counts() {
        let methods = HistogramMethods::<i64>::new(vec![10.0]).unwrap();
        let prior = methods.init();
        let current = methods.init();
        methods.update(&prior, 1, ExemplarBits::default());
        methods.update(&current, 1, ExemplarBits::default());
        methods.update(&current, 20, ExemplarBits::default());

        methods.subtract_swap(&prior, &current);

        let Aggregation::Histogram(point) = methods.to_aggregation(&prior) else {
            panic!("expected a histogram");
        };
        assert_eq!(point.count, 1);
        assert_eq!(point.bucket_counts, vec![0, 1]);
        assert_eq!(point.sum, Number::from_i64(20));
        assert_eq!(point.min, None);
    }

    #[rstest]
    #[case(&[i64::MAX, 1], i64::MIN)]
    #[case(&[i64::MIN, -1], i64::MAX)]
    fn i64_sum_wraps_like_counters(#[case] values: &[i64], #[case] sum: i64) {
        let methods = HistogramMethods::<i64>::new(vec![]).unwrap();
        let storage = methods.init();
        for v in values {
            methods.update(&storage, *v, ExemplarBits::default());
        }
        let merged = methods.init();
        methods.merge(&storage, &merged);
        methods.merge(&storage, &merged);

        assert_eq!(storage.sum(), sum);
        assert_eq!(storage.count(), 2);
        assert_eq!(merged.sum(), sum.wrapping_add(sum));
    }

    #[test]
    fn subtract_swap_wraps_i64_sum() {
        let methods = HistogramMethods::<i64>::new(vec![]).unwrap();
        let prior = methods.init();
        let current = methods.init();
        methods.update(&prior, i64::MIN, ExemplarBits::default());
        methods.update(&current, i64::MAX, ExemplarBits::default());

        methods.subtract_swap(&prior, &current);

        assert_eq!(prior.sum(), -1);
    }

    #[test]
    fn merge_combines_extrema() {
        let methods = HistogramMethods::<i64>::new(vec![]).unwrap();
        let a = methods.init();
        let b = methods.init();
        methods.update(&a, 5, ExemplarBits::default());
        methods.update(&b, -3, ExemplarBits::default());
        methods.update(&b, 9, ExemplarBits::default());

        methods.merge(&b, &a);

        assert_eq!(a.count(), 3);
        assert_eq!(a.sum(), 11);
        let Aggregation::Histogram(point) = methods.to_aggregation(&a) else {
            panic!("expected a histogram");
        };
        assert_eq!(point.min, Some(Number::from_i64(-3)));
        assert_eq!(point.max, Some(Number::from_i64(9)));
    }
}
