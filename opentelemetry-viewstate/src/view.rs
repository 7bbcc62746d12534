//! Per-view configuration consumed by [`compile`](crate::viewstate::compile).
//!
//! ## Environment variables
//!
//! [`View::default`] reads:
//!
//! * `OTEL_EXPORTER_OTLP_METRICS_TEMPORALITY_PREFERENCE`: `cumulative`
//!   (default), `delta` or `lowmemory`.
//! * `OTEL_METRICS_EXEMPLAR_FILTER`: `always_on`, `always_off` or
//!   `trace_based` (default).
//!
//! Unrecognised values are reported with an internal warning and replaced
//! by the default.
use std::env;
use std::str::FromStr;

use opentelemetry::otel_warn;

use crate::aggregator::AggregationKind;
use crate::attributes::KeysFilter;
use crate::data::Temporality;
use crate::error::MetricError;
use crate::instrument::InstrumentKind;

/// Environment variable selecting the [`TemporalityPreference`].
pub const OTEL_EXPORTER_OTLP_METRICS_TEMPORALITY_PREFERENCE: &str =
    "OTEL_EXPORTER_OTLP_METRICS_TEMPORALITY_PREFERENCE";
/// Environment variable selecting the [`ExemplarFilter`].
pub const OTEL_METRICS_EXEMPLAR_FILTER: &str = "OTEL_METRICS_EXEMPLAR_FILTER";

/// How an exporter would like each instrument kind reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemporalityPreference {
    /// Every instrument is cumulative.
    #[default]
    Cumulative,
    /// Monotonic sums, histograms and gauges are delta; up-down counters stay
    /// cumulative.
    Delta,
    /// Only synchronous counters and histograms are delta, which keeps the
    /// number of retained timeseries lowest.
    LowMemory,
}

impl TemporalityPreference {
    /// Selects the temporality for an instrument kind.
    pub fn temporality_for(&self, kind: InstrumentKind) -> Temporality {
        match self {
            TemporalityPreference::Cumulative => Temporality::Cumulative,
            TemporalityPreference::Delta => match kind {
                InstrumentKind::Counter
                | InstrumentKind::Histogram
                | InstrumentKind::ObservableCounter
                | InstrumentKind::Gauge
                | InstrumentKind::ObservableGauge => Temporality::Delta,
                InstrumentKind::UpDownCounter | InstrumentKind::ObservableUpDownCounter => {
                    Temporality::Cumulative
                }
            },
            TemporalityPreference::LowMemory => match kind {
                InstrumentKind::Counter | InstrumentKind::Histogram => Temporality::Delta,
                InstrumentKind::ObservableCounter
                | InstrumentKind::Gauge
                | InstrumentKind::ObservableGauge
                | InstrumentKind::UpDownCounter
                | InstrumentKind::ObservableUpDownCounter => Temporality::Cumulative,
            },
        }
    }
}

impl FromStr for TemporalityPreference {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cumulative" => Ok(TemporalityPreference::Cumulative),
            "delta" => Ok(TemporalityPreference::Delta),
            "lowmemory" => Ok(TemporalityPreference::LowMemory),
            _ => Err(MetricError::Config(format!(
                "unknown temporality preference {s:?}"
            ))),
        }
    }
}

/// Which measurements of synchronous instruments may become exemplars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExemplarFilter {
    /// Every measurement.
    AlwaysOn,
    /// No measurement.
    AlwaysOff,
    /// Measurements made inside a sampled trace.
    #[default]
    TraceBased,
}

impl FromStr for ExemplarFilter {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always_on" => Ok(ExemplarFilter::AlwaysOn),
            "always_off" => Ok(ExemplarFilter::AlwaysOff),
            "trace_based" => Ok(ExemplarFilter::TraceBased),
            _ => Err(MetricError::Config(format!(
                "unknown exemplar filter {s:?}"
            ))),
        }
    }
}

/// Reads `name`, falling back to the default when unset or invalid.
fn from_env<T>(name: &'static str) -> T
where
    T: FromStr<Err = MetricError> + Default,
{
    env::var(name)
        .ok()
        .and_then(|v| match v.parse() {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                otel_warn!(
                    name: "View.InvalidEnvironmentValue",
                    variable = name,
                    error = format!("{err}"),
                );
                None
            }
        })
        .unwrap_or_default()
}

/// The per-view settings an instrument is compiled with.
///
/// # Example
///
/// ```
/// use opentelemetry_viewstate::{AggregationKind, KeysFilter, TemporalityPreference, View};
///
/// let view = View::default()
///     .with_aggregation(AggregationKind::Histogram {
///         boundaries: vec![1.0, 10.0, 100.0],
///     })
///     .with_temporality_preference(TemporalityPreference::Delta)
///     .with_keys_filter(KeysFilter::allow_keys(["http.route"]));
/// ```
#[derive(Clone, Debug)]
pub struct View {
    aggregation: Option<AggregationKind>,
    temporality_preference: TemporalityPreference,
    keys_filter: Option<KeysFilter>,
    exemplar_filter: ExemplarFilter,
}

impl Default for View {
    /// Creates a view with the instrument's default aggregation, configured
    /// from the environment.
    fn default() -> Self {
        View {
            aggregation: None,
            temporality_preference: from_env(OTEL_EXPORTER_OTLP_METRICS_TEMPORALITY_PREFERENCE),
            keys_filter: None,
            exemplar_filter: from_env(OTEL_METRICS_EXEMPLAR_FILTER),
        }
    }
}

impl View {
    /// Overrides the aggregation implied by the instrument kind.
    pub fn with_aggregation(mut self, aggregation: AggregationKind) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Sets the temporality preference.
    pub fn with_temporality_preference(mut self, preference: TemporalityPreference) -> Self {
        self.temporality_preference = preference;
        self
    }

    /// Restricts the attributes kept on every measurement.
    pub fn with_keys_filter(mut self, filter: KeysFilter) -> Self {
        self.keys_filter = Some(filter);
        self
    }

    /// Sets the exemplar filter used by synchronous instruments.
    pub fn with_exemplar_filter(mut self, filter: ExemplarFilter) -> Self {
        self.exemplar_filter = filter;
        self
    }

    /// The configured aggregation, if any.
    pub fn aggregation(&self) -> Option<&AggregationKind> {
        self.aggregation.as_ref()
    }

    /// The temporality preference.
    pub fn temporality_preference(&self) -> TemporalityPreference {
        self.temporality_preference
    }

    /// The attribute filter, if any.
    pub fn keys_filter(&self) -> Option<&KeysFilter> {
        self.keys_filter.as_ref()
    }

    /// The exemplar filter.
    pub fn exemplar_filter(&self) -> ExemplarFilter {
        self.exemplar_filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_without_env() {
        temp_env::with_vars_unset(
            [
                OTEL_EXPORTER_OTLP_METRICS_TEMPORALITY_PREFERENCE,
                OTEL_METRICS_EXEMPLAR_FILTER,
            ],
            || {
                let view = View::default();
                assert_eq!(
                    view.temporality_preference(),
                    TemporalityPreference::Cumulative
                );
                assert_eq!(view.exemplar_filter(), ExemplarFilter::TraceBased);
                assert!(view.aggregation().is_none());
                assert!(view.keys_filter().is_none());
            },
        );
    }

    #[test]
    fn configured_with_env() {
        temp_env::with_vars(
            [
                (
                    OTEL_EXPORTER_OTLP_METRICS_TEMPORALITY_PREFERENCE,
                    Some("LowMemory"),
                ),
                (OTEL_METRICS_EXEMPLAR_FILTER, Some("always_off")),
            ],
            || {
                let view = View::default();
                assert_eq!(
                    view.temporality_preference(),
                    TemporalityPreference::LowMemory
                );
                assert_eq!(view.exemplar_filter(), ExemplarFilter::AlwaysOff);
            },
        );
    }

    #[test]
    fn invalid_env_falls_back_to_default() {
        temp_env::with_vars(
            [
                (
                    OTEL_EXPORTER_OTLP_METRICS_TEMPORALITY_PREFERENCE,
                    Some("sometimes"),
                ),
                (OTEL_METRICS_EXEMPLAR_FILTER, Some("")),
            ],
            || {
                let view = View::default();
                assert_eq!(
                    view.temporality_preference(),
                    TemporalityPreference::Cumulative
                );
                assert_eq!(view.exemplar_filter(), ExemplarFilter::TraceBased);
            },
        );
    }

    #[test]
    fn builder_overrides_env() {
        temp_env::with_var(
            OTEL_EXPORTER_OTLP_METRICS_TEMPORALITY_PREFERENCE,
            Some("delta"),
            || {
                let view = View::default()
                    .with_temporality_preference(TemporalityPreference::Cumulative)
                    .with_exemplar_filter(ExemplarFilter::AlwaysOn)
                    .with_aggregation(AggregationKind::Gauge);
                assert_eq!(
                    view.temporality_preference(),
                    TemporalityPreference::Cumulative
                );
                assert_eq!(view.exemplar_filter(), ExemplarFilter::AlwaysOn);
                assert_eq!(view.aggregation(), Some(&AggregationKind::Gauge));
            },
        );
    }

    #[rstest]
    #[case(InstrumentKind::Counter, Temporality::Delta, Temporality::Delta)]
    #[case(InstrumentKind::Histogram, Temporality::Delta, Temporality::Delta)]
    #[case(InstrumentKind::Gauge, Temporality::Delta, Temporality::Cumulative)]
    #[case(InstrumentKind::ObservableCounter, Temporality::Delta, Temporality::Cumulative)]
    #[case(InstrumentKind::ObservableGauge, Temporality::Delta, Temporality::Cumulative)]
    #[case(InstrumentKind::UpDownCounter, Temporality::Cumulative, Temporality::Cumulative)]
    #[case(
        InstrumentKind::ObservableUpDownCounter,
        Temporality::Cumulative,
        Temporality::Cumulative
    )]
    fn temporality_by_preference(
        #[case] kind: InstrumentKind,
        #[case] delta: Temporality,
        #[case] low_memory: Temporality,
    ) {
        assert_eq!(
            TemporalityPreference::Cumulative.temporality_for(kind),
            Temporality::Cumulative
        );
        assert_eq!(TemporalityPreference::Delta.temporality_for(kind), delta);
        assert_eq!(
            TemporalityPreference::LowMemory.temporality_for(kind),
            low_memory
        );
    }
}
