//! Fixed-width numeric values shared by all instruments.
//!
//! A [`Number`] is eight bytes holding either an `i64` or the bit pattern of
//! an `f64`. Which one applies is never stored in the value itself: it is the
//! [`NumberKind`] declared by the instrument's
//! [`Descriptor`](crate::instrument::Descriptor).
use core::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// The data type carried by a [`Number`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberKind {
    /// A signed 64-bit integer.
    I64,
    /// A 64-bit IEEE-754 floating point number.
    F64,
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberKind::I64 => f.write_str("i64"),
            NumberKind::F64 => f.write_str("f64"),
        }
    }
}

/// A 64-bit value interpreted according to an out-of-band [`NumberKind`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Number(u64);

impl Number {
    /// Encodes an integer, reinterpreting its two's-complement bits.
    pub const fn from_i64(value: i64) -> Self {
        Number(value as u64)
    }

    /// Encodes a float, keeping its exact bit pattern (NaN payloads included).
    pub fn from_f64(value: f64) -> Self {
        Number(value.to_bits())
    }

    /// Wraps raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Number(bits)
    }

    /// The raw bits.
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Decodes as an integer. Only meaningful for [`NumberKind::I64`] values.
    pub const fn to_i64(self) -> i64 {
        self.0 as i64
    }

    /// Decodes as a float. Only meaningful for [`NumberKind::F64`] values.
    pub fn to_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Converts to `f64` according to `kind`.
    ///
    /// Integers may lose precision past 2^53.
    pub fn coerce_to_f64(self, kind: NumberKind) -> f64 {
        match kind {
            NumberKind::I64 => self.to_i64() as f64,
            NumberKind::F64 => self.to_f64(),
        }
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Number({:#018x})", self.0)
    }
}

/// A primitive that instruments can be declared over.
///
/// Implemented for `i64` and `f64`.
pub trait Numeric:
    PartialOrd
    + fmt::Debug
    + fmt::Display
    + Clone
    + Copy
    + PartialEq
    + Default
    + Send
    + Sync
    + 'static
{
    /// The kind tag matching this primitive.
    const KIND: NumberKind;

    /// Lock-free cell used by storages that hold a single value.
    type Atomic: AtomicNumber<Self>;

    /// Converts to `f64` for bucketing; `i64` values may lose precision.
    fn into_float(self) -> f64;

    /// Packs the value into its kind-erased form.
    fn to_number(self) -> Number;

    /// Unpacks a [`Number`] of this primitive's kind.
    fn from_number(number: Number) -> Self;

    /// `self + rhs`, wrapping at the bounds of integer types like the
    /// atomic cells do.
    fn wrapping_add(self, rhs: Self) -> Self;

    /// `self - rhs`, wrapping at the bounds of integer types.
    fn wrapping_sub(self, rhs: Self) -> Self;
}

impl Numeric for i64 {
    const KIND: NumberKind = NumberKind::I64;

    type Atomic = AtomicI64;

    fn into_float(self) -> f64 {
        // May have precision loss at high values
        self as f64
    }

    fn to_number(self) -> Number {
        Number::from_i64(self)
    }

    fn from_number(number: Number) -> Self {
        number.to_i64()
    }

    fn wrapping_add(self, rhs: Self) -> Self {
        i64::wrapping_add(self, rhs)
    }

    fn wrapping_sub(self, rhs: Self) -> Self {
        i64::wrapping_sub(self, rhs)
    }
}

impl Numeric for f64 {
    const KIND: NumberKind = NumberKind::F64;

    type Atomic = AtomicF64;

    fn into_float(self) -> f64 {
        self
    }

    fn to_number(self) -> Number {
        Number::from_f64(self)
    }

    fn from_number(number: Number) -> Self {
        number.to_f64()
    }

    fn wrapping_add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn wrapping_sub(self, rhs: Self) -> Self {
        self - rhs
    }
}

/// Marks a type that can have a value added and retrieved atomically. Required since
/// different types have different backing atomic mechanisms
pub trait AtomicNumber<T>: Default + Send + Sync + 'static {
    /// Adds `value` to the cell.
    fn add(&self, value: T);
    /// Reads the cell.
    fn load(&self) -> T;
    /// Overwrites the cell.
    fn store(&self, value: T);
    /// Overwrites the cell, returning the previous value.
    fn swap(&self, value: T) -> T;
}

impl AtomicNumber<i64> for AtomicI64 {
    fn add(&self, value: i64) {
        self.fetch_add(value, Ordering::Relaxed);
    }

    fn load(&self) -> i64 {
        AtomicI64::load(self, Ordering::Relaxed)
    }

    fn store(&self, value: i64) {
        AtomicI64::store(self, value, Ordering::Relaxed);
    }

    fn swap(&self, value: i64) -> i64 {
        AtomicI64::swap(self, value, Ordering::Relaxed)
    }
}

/// An `f64` stored as bits in an [`AtomicU64`].
///
/// Floating points don't have native atomic addition, so `add` is a
/// compare-and-swap loop.
#[derive(Debug, Default)]
pub struct AtomicF64 {
    inner: AtomicU64,
}

impl AtomicF64 {
    /// Creates a cell holding `value`.
    pub fn new(value: f64) -> Self {
        AtomicF64 {
            inner: AtomicU64::new(value.to_bits()),
        }
    }
}

impl AtomicNumber<f64> for AtomicF64 {
    fn add(&self, value: f64) {
        let mut current = self.inner.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self.inner.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.inner.load(Ordering::Relaxed))
    }

    fn store(&self, value: f64) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    fn swap(&self, value: f64) -> f64 {
        f64::from_bits(self.inner.swap(value.to_bits(), Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(-1)]
    #[case(i64::MIN)]
    #[case(i64::MAX)]
    fn i64_round_trips(#[case] value: i64) {
        assert_eq!(Number::from_i64(value).to_i64(), value);
        assert_eq!(value.to_number(), Number::from_i64(value));
        assert_eq!(i64::from_number(value.to_number()), value);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.0)]
    #[case(1.5)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    #[case(f64::NAN)]
    #[case(f64::MIN_POSITIVE)]
    fn f64_round_trips_bit_exact(#[case] value: f64) {
        let decoded = Number::from_f64(value).to_f64();
        assert_eq!(decoded.to_bits(), value.to_bits());
    }

    #[test]
    fn nan_payload_is_preserved() {
        let payload = f64::from_bits(0x7ff8_0000_dead_beef);
        assert_eq!(
            Number::from_f64(payload).to_f64().to_bits(),
            0x7ff8_0000_dead_beef
        );
    }

    #[test]
    fn negative_integer_is_twos_complement() {
        assert_eq!(Number::from_i64(-1).to_bits(), u64::MAX);
    }

    #[test]
    fn coerce_uses_declared_kind() {
        assert_eq!(Number::from_i64(-7).coerce_to_f64(NumberKind::I64), -7.0);
        assert_eq!(Number::from_f64(2.25).coerce_to_f64(NumberKind::F64), 2.25);
    }

    #[rstest]
    #[case(i64::MAX, 1, i64::MIN)]
    #[case(i64::MIN, -1, i64::MAX)]
    #[case(40, 2, 42)]
    fn i64_addition_wraps(#[case] lhs: i64, #[case] rhs: i64, #[case] expected: i64) {
        assert_eq!(Numeric::wrapping_add(lhs, rhs), expected);

        let atomic = AtomicI64::new(lhs);
        AtomicNumber::add(&atomic, rhs);
        assert_eq!(AtomicNumber::load(&atomic), expected);
    }

    #[rstest]
    #[case(i64::MAX, i64::MIN, -1)]
    #[case(i64::MIN, 1, i64::MAX)]
    #[case(5, 8, -3)]
    fn i64_subtraction_wraps(#[case] lhs: i64, #[case] rhs: i64, #[case] expected: i64) {
        assert_eq!(Numeric::wrapping_sub(lhs, rhs), expected);
    }

    #[test]
    fn f64_arithmetic_is_plain() {
        assert_eq!(Numeric::wrapping_add(f64::MAX, f64::MAX), f64::INFINITY);
        assert_eq!(Numeric::wrapping_sub(1.5, 4.0), -2.5);
    }

    #[test]
    fn can_add_and_get_i64_atomic_value() {
        let atomic = AtomicI64::default();
        AtomicNumber::add(&atomic, 15);
        AtomicNumber::add(&atomic, -10);

        assert_eq!(AtomicNumber::load(&atomic), 5);
    }

    #[test]
    fn can_swap_i64_atomic_value() {
        let atomic = AtomicI64::default();
        AtomicNumber::add(&atomic, 15);

        let value = AtomicNumber::swap(&atomic, 0);
        let value2 = AtomicNumber::load(&atomic);

        assert_eq!(value, 15, "Incorrect first value");
        assert_eq!(value2, 0, "Incorrect second value");
    }

    #[test]
    fn can_add_and_get_f64_atomic_value() {
        let atomic = AtomicF64::default();
        atomic.add(15.3);
        atomic.add(10.4);

        assert!(f64::abs(25.7 - atomic.load()) < 0.0001);
    }

    #[test]
    fn f64_atomic_add_from_many_threads() {
        let atomic = AtomicF64::new(0.0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        atomic.add(0.5);
                    }
                });
            }
        });
        assert_eq!(atomic.load(), 2000.0);
    }
}
