use crate::SharedIndex;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{counter::Counter, gauge::ConstGauge, MetricType},
    registry::Registry,
};

/// Counts updates to a [`DependencyIndex`](crate::DependencyIndex).
#[derive(Clone, Debug, Default)]
pub struct IndexMetrics {
    pub(crate) tracks: Counter,
    pub(crate) moves: Counter,
    pub(crate) untracks: Counter,
    pub(crate) queries: Counter,
    pub(crate) resets: Counter,
}

#[derive(Debug)]
struct Instrumented(SharedIndex);

impl IndexMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let tracks = Counter::default();
        prom.register(
            "dependency_index_tracks",
            "Count of dependents newly associated with an owner",
            tracks.clone(),
        );

        let moves = Counter::default();
        prom.register(
            "dependency_index_moves",
            "Count of dependents moved from one owner to another",
            moves.clone(),
        );

        let untracks = Counter::default();
        prom.register(
            "dependency_index_untracks",
            "Count of dependents removed from the index",
            untracks.clone(),
        );

        let queries = Counter::default();
        prom.register(
            "dependency_index_queries",
            "Count of owner lookups",
            queries.clone(),
        );

        let resets = Counter::default();
        prom.register(
            "dependency_index_resets",
            "Count of full resyncs of the index",
            resets.clone(),
        );

        Self {
            tracks,
            moves,
            untracks,
            queries,
            resets,
        }
    }
}

/// Reports the size of `index` each time the registry is encoded.
pub fn register_size(prom: &mut Registry, index: SharedIndex) {
    prom.register_collector(Box::new(Instrumented(index)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let owners = ConstGauge::new(self.0.owner_count() as i64);
        let owners_encoder = encoder.encode_descriptor(
            "dependency_index_owners",
            "The number of owners with tracked dependents",
            None,
            MetricType::Gauge,
        )?;
        owners.encode(owners_encoder)?;

        let dependents = ConstGauge::new(self.0.len() as i64);
        let dependents_encoder = encoder.encode_descriptor(
            "dependency_index_dependents",
            "The number of tracked dependents",
            None,
            MetricType::Gauge,
        )?;
        dependents.encode(dependents_encoder)?;

        Ok(())
    }
}
