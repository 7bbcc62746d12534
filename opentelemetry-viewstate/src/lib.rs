//! # OpenTelemetry View State
//!
//! The aggregation core of a metrics SDK: per-view, per-attribute-set state
//! for synchronous and asynchronous instruments, and the collection
//! strategies that turn it into cumulative or delta points.
//!
//! An SDK compiles every (instrument, view) pair into an
//! [`Instrument`](viewstate::Instrument), binds
//! [`Accumulator`](viewstate::Accumulator)s to attribute sets on the
//! measurement path and calls [`collect`](viewstate::Instrument::collect)
//! once per export cycle.
//!
//! ## Getting Started
//!
//! ```
//! use opentelemetry::KeyValue;
//! use opentelemetry_viewstate::data::SequenceTracker;
//! use opentelemetry_viewstate::viewstate::compile;
//! use opentelemetry_viewstate::{
//!     AttributeSet, Descriptor, ExemplarBits, InstrumentKind, NumberKind, View,
//! };
//! use std::time::SystemTime;
//!
//! let descriptor = Descriptor::new("requests", InstrumentKind::Counter, NumberKind::I64);
//! let instrument = compile::<i64>(descriptor, &View::default()).unwrap();
//!
//! let acc = instrument.new_accumulator(AttributeSet::from([KeyValue::new("route", "/")]));
//! acc.update(1, ExemplarBits::default());
//! acc.snapshot_and_process(true);
//!
//! let sequence = SequenceTracker::new(SystemTime::now()).next(SystemTime::now());
//! let mut output = Vec::new();
//! instrument.collect(&sequence, &mut output);
//! assert_eq!(output[0].points.len(), 1);
//! ```
//!
//! ## Crate Feature Flags
//!
//! * `internal-logs`: emits internal diagnostics through `tracing`. Enabled
//!   by default.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(clippy::needless_doctest_main)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-rust/main/assets/logo.svg"
)]

pub mod aggregator;
pub mod attributes;
pub mod data;
pub mod error;
pub mod instrument;
pub mod number;
pub mod view;
pub mod viewstate;

pub use aggregator::{AggregationKind, ExemplarBits};
pub use attributes::{AttributeSet, KeysFilter};
pub use error::{MetricError, MetricResult};
pub use instrument::{Descriptor, InstrumentKind};
pub use number::{Number, NumberKind};
pub use view::{ExemplarFilter, TemporalityPreference, View};
