//! Timeseries identity: attribute sets and the keys filter applied to them.
mod filter;
mod set;

pub use filter::KeysFilter;
pub use set::{AttributeSet, OVERFLOW_ATTRIBUTE_KEY, OVERFLOW_ATTRIBUTE_SET};
