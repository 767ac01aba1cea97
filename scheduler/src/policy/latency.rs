use super::{after, walk, Scheduler, Target, Tracker};
use crate::{Client, Config, Error, Node, Prober};
use blockstream_utils::Clock;
use blockstream_verifier::{Block, Summary};
use prometheus_client::registry::Registry;
use std::sync::Arc;

/// Selects the node with the lowest latency that has the block, regardless of priority.
///
/// All nodes compete with each other: the ones ordered after the current node are probed and a
/// reschedule is requested once any of them is faster by more than the configured threshold.
pub struct Latency<E: Clock, C: Client> {
    nodes: Vec<Arc<Node<E, C>>>,
    tracker: Tracker<E, C>,
}

impl<E: Clock, C: Client> Latency<E, C> {
    pub fn new(
        context: E,
        config: &Config,
        nodes: Vec<Arc<Node<E, C>>>,
        prober: Prober<E, C>,
        registry: &mut Registry,
    ) -> Self {
        Self {
            nodes,
            tracker: Tracker::new(context, config, prober, registry),
        }
    }
}

impl<E: Clock, C: Client> Scheduler<E, C> for Latency<E, C> {
    fn select(&mut self, target: Target) -> Result<(Arc<Node<E, C>>, u64), Error> {
        self.tracker.cancel();
        self.nodes.sort_by_cached_key(|node| node.latency_key());
        let nodes = &self.nodes;
        self.tracker
            .scheduled(walk(nodes, target), |current| after(nodes, current))
    }

    fn should_reschedule(&mut self, summary: &Summary, block: &Block) -> bool {
        self.tracker.should_reschedule(summary, block)
    }

    fn close(&mut self) {
        self.tracker.close();
        for node in &self.nodes {
            node.close();
        }
    }
}
