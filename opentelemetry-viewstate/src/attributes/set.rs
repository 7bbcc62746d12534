use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use opentelemetry::{Key, KeyValue, Value};
use rustc_hash::FxHasher;

/// Key of the single attribute carried by [`OVERFLOW_ATTRIBUTE_SET`].
pub const OVERFLOW_ATTRIBUTE_KEY: &str = "otel.metric.overflow";

/// The synthetic timeseries that absorbs measurements once an instrument has
/// seen too many distinct attribute sets.
///
/// Deciding *when* to fold into this set is up to the caller; instruments
/// only treat it specially when rotating delta state.
pub static OVERFLOW_ATTRIBUTE_SET: Lazy<AttributeSet> =
    Lazy::new(|| AttributeSet::from(&[KeyValue::new(OVERFLOW_ATTRIBUTE_KEY, true)][..]));

/// A unique set of attributes that can be used as instrument identifiers.
///
/// This must implement [Hash], [PartialEq], and [Eq] so it may be used as
/// HashMap keys and other de-duplication methods.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSet(Vec<KeyValue>, u64);

impl From<&[KeyValue]> for AttributeSet {
    fn from(values: &[KeyValue]) -> Self {
        // the last value recorded for a key wins
        let mut seen_keys = HashSet::with_capacity(values.len());
        let vec = values
            .iter()
            .rev()
            .filter_map(|kv| {
                if seen_keys.insert(kv.key.clone()) {
                    Some(kv.clone())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        AttributeSet::new(vec)
    }
}

impl Default for AttributeSet {
    fn default() -> Self {
        AttributeSet::new(Vec::new())
    }
}

impl<const N: usize> From<[KeyValue; N]> for AttributeSet {
    fn from(values: [KeyValue; N]) -> Self {
        AttributeSet::from(&values[..])
    }
}

fn calculate_hash(values: &[KeyValue]) -> u64 {
    let mut hasher = FxHasher::default();
    values.iter().fold(&mut hasher, |hasher, item| {
        item.key.hash(hasher);
        item.value.as_str().hash(hasher);
        hasher
    });
    hasher.finish()
}

impl AttributeSet {
    fn new(mut values: Vec<KeyValue>) -> Self {
        values.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        let hash = calculate_hash(&values);
        AttributeSet(values, hash)
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this is the [`OVERFLOW_ATTRIBUTE_SET`].
    pub fn is_overflow(&self) -> bool {
        self.1 == OVERFLOW_ATTRIBUTE_SET.1 && self.0 == OVERFLOW_ATTRIBUTE_SET.0
    }

    /// Retains only the attributes specified by the predicate.
    pub fn retain<F>(&mut self, f: F)
    where
        F: Fn(&KeyValue) -> bool,
    {
        self.0.retain(|kv| f(kv));

        // Recalculate the hash as elements are changed.
        self.1 = calculate_hash(&self.0);
    }

    /// Iterate over key value pairs in the set
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.0.iter().map(|kv| (&kv.key, &kv.value))
    }

    /// The sorted key-value pairs.
    pub fn as_slice(&self) -> &[KeyValue] {
        &self.0
    }

    /// Consumes the set, returning the sorted key-value pairs.
    pub fn into_vec(self) -> Vec<KeyValue> {
        self.0
    }
}

// Float values that are not equal to themselves are not expected as
// attribute values.
impl Eq for AttributeSet {}

impl Hash for AttributeSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.1)
    }
}
