use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use opentelemetry::{Key, KeyValue};

use super::AttributeSet;

type Filter = Arc<dyn Fn(&KeyValue) -> bool + Send + Sync>;

/// Drops attribute keys before a measurement is indexed.
///
/// Instruments apply the filter to every attribute set *before* looking up
/// or creating its storage, so the filtered set is the canonical key and
/// measurements that differ only in dropped keys share one timeseries.
#[derive(Clone)]
pub struct KeysFilter {
    filter: Filter,
}

impl KeysFilter {
    /// Keeps the attributes for which `filter` returns `true`.
    pub fn new<F>(filter: F) -> Self
    where
        F: Fn(&KeyValue) -> bool + Send + Sync + 'static,
    {
        KeysFilter {
            filter: Arc::new(filter),
        }
    }

    /// Keeps only the listed keys.
    pub fn allow_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let keys: HashSet<Key> = keys.into_iter().map(Into::into).collect();
        KeysFilter::new(move |kv| keys.contains(&kv.key))
    }

    /// Returns the canonical form of `attrs`.
    ///
    /// The overflow set passes through untouched so it stays recognisable.
    pub fn apply(&self, mut attrs: AttributeSet) -> AttributeSet {
        if attrs.is_overflow() {
            return attrs;
        }
        attrs.retain(|kv| (self.filter)(kv));
        attrs
    }
}

impl fmt::Debug for KeysFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeysFilter")
    }
}
