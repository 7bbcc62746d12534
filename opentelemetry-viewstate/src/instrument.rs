//! Instrument identity: kind and descriptor.
use std::borrow::Cow;

use crate::number::NumberKind;

/// Kinds of OpenTelemetry metric instruments
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// A synchronous per-request part of a monotonic sum.
    Counter,
    /// A synchronous per-request part of a non-monotonic sum.
    UpDownCounter,
    /// A synchronous recorder of a distribution of values.
    Histogram,
    /// A synchronous recorder of the current value.
    Gauge,
    /// An asynchronous per-interval recorder of a monotonic sum.
    ObservableCounter,
    /// An asynchronous per-interval recorder of a non-monotonic sum.
    ObservableUpDownCounter,
    /// An asynchronous per-interval recorder of the current value.
    ObservableGauge,
}

impl InstrumentKind {
    /// Whether this is a synchronous kind of instrument.
    pub fn synchronous(&self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter
                | InstrumentKind::UpDownCounter
                | InstrumentKind::Histogram
                | InstrumentKind::Gauge
        )
    }

    /// Whether this is an asynchronous kind of instrument.
    pub fn asynchronous(&self) -> bool {
        !self.synchronous()
    }

    /// Whether this kind of instrument exposes a non-decreasing sum.
    pub fn monotonic(&self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter | InstrumentKind::ObservableCounter
        )
    }
}

/// Descriptor contains all the settings that describe an instrument, including
/// its name, instrument kind, number kind, and the configurable options.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor {
    name: Cow<'static, str>,
    instrument_kind: InstrumentKind,
    number_kind: NumberKind,
    description: Cow<'static, str>,
    unit: Cow<'static, str>,
}

impl Descriptor {
    /// Create a new descriptor
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        instrument_kind: InstrumentKind,
        number_kind: NumberKind,
    ) -> Self {
        Descriptor {
            name: name.into(),
            instrument_kind,
            number_kind,
            description: Cow::Borrowed(""),
            unit: Cow::Borrowed(""),
        }
    }

    /// Sets the human-readable description.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the unit of measure.
    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = unit.into();
        self
    }

    /// The metric instrument's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The specific kind of instrument.
    pub fn instrument_kind(&self) -> InstrumentKind {
        self.instrument_kind
    }

    /// Whether this instrument is declared over `i64` or `f64` values.
    pub fn number_kind(&self) -> NumberKind {
        self.number_kind
    }

    /// A human-readable description of the metric instrument.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Unit describes the units of the metric instrument.
    pub fn unit(&self) -> &str {
        &self.unit
    }
}
