use std::fmt::Debug;

/// Decides, per measurement, whether an exemplar may be taken.
///
/// Filters are zero-sized and selected at compile time so the check costs
/// nothing on the update path.
pub trait SampleFilter: Debug + Send + Sync + 'static {
    /// Whether a measurement made in a context with the given trace state may
    /// be sampled.
    fn may_sample(is_traced: bool) -> bool;
}

/// Samples every measurement.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOnFilter;

impl SampleFilter for AlwaysOnFilter {
    fn may_sample(_is_traced: bool) -> bool {
        true
    }
}

/// Samples nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOffFilter;

impl SampleFilter for AlwaysOffFilter {
    fn may_sample(_is_traced: bool) -> bool {
        false
    }
}

/// Samples measurements made inside a sampled trace.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceBasedFilter;

impl SampleFilter for TraceBasedFilter {
    fn may_sample(is_traced: bool) -> bool {
        is_traced
    }
}
