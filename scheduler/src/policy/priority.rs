use super::{walk, Scheduler, Target};
use crate::{metrics, Client, Error, Node};
use blockstream_utils::Clock;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::debug;

/// Selects the first node, by configured priority, that has the block.
///
/// The order is fixed at construction (ties broken by configuration order) and latency is never
/// measured.
pub struct Priority<E: Clock, C: Client> {
    nodes: Vec<Arc<Node<E, C>>>,
    metrics: metrics::Scheduler,
}

impl<E: Clock, C: Client> Priority<E, C> {
    pub fn new(mut nodes: Vec<Arc<Node<E, C>>>, registry: &mut Registry) -> Self {
        nodes.sort_by_cached_key(|node| node.natural_key());
        Self {
            nodes,
            metrics: metrics::Scheduler::init(registry),
        }
    }
}

impl<E: Clock, C: Client> Scheduler<E, C> for Priority<E, C> {
    fn select(&mut self, target: Target) -> Result<(Arc<Node<E, C>>, u64), Error> {
        match walk(&self.nodes, target) {
            Ok((node, block)) => {
                debug!(%node, block, "selected node");
                self.metrics.schedule.inc();
                Ok((node, block))
            }
            Err(err) => {
                self.metrics.schedule_failed.inc();
                Err(err)
            }
        }
    }

    fn close(&mut self) {
        for node in &self.nodes {
            node.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks,
        policy::tests::{clock, connected, deactivate, nodes, observed, TestNode},
    };
    use blockstream_utils::ManualClock;
    use std::time::Duration;

    fn scheduler(nodes: &[TestNode]) -> Priority<ManualClock, mocks::Client> {
        Priority::new(nodes.to_vec(), &mut Registry::default())
    }

    #[test]
    fn test_lower_priority_with_block() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=4), (0, 0..=4), (1, 0..=10), (1, 0..=10)]);
        let mut scheduler = scheduler(&nodes);

        let node = scheduler.node(5).unwrap();
        assert_eq!(node.priority(), 1);
        assert_eq!(node.index(), 2);

        // Higher priority preferred when it has the block
        assert_eq!(scheduler.node(4).unwrap().index(), 0);
    }

    #[test]
    fn test_order_fixed_by_priority() {
        let clock = clock();
        let nodes = nodes(&clock, &[(2, 0..=10), (1, 0..=10), (1, 0..=10)]);
        let mut scheduler = scheduler(&nodes);
        assert_eq!(scheduler.node(1).unwrap().index(), 1);

        // Latency is ignored
        nodes[1].record_latency(10_000);
        assert_eq!(scheduler.node(1).unwrap().index(), 1);

        // Never asks to reschedule
        clock.advance(Duration::from_secs(60));
        let (summary, block) = observed(&clock, 10_000);
        assert!(!scheduler.should_reschedule(&summary, &block));
    }

    #[test]
    fn test_inactive_skipped() {
        let clock = clock();
        let (nodes, clients) = connected(&clock, &[(0, 0..=10), (1, 0..=10)]);
        let mut scheduler = scheduler(&nodes);
        deactivate(&nodes[0], &clients[0]);
        assert_eq!(scheduler.node(1).unwrap().index(), 1);

        // Forced back when it is the only one with the block
        clients[1].set_range(Some(0..=5));
        assert_eq!(scheduler.node(8).unwrap().index(), 0);
        assert!(nodes[0].is_active());
    }

    #[test]
    fn test_no_node() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=4), (1, 2..=6)]);
        let mut scheduler = scheduler(&nodes);
        let err = scheduler.node(7).unwrap_err();
        assert_eq!(err.to_string(), "no block node can provide block 7");
        assert_eq!(scheduler.metrics.schedule_failed.get(), 1);
    }

    #[test]
    fn test_earliest() {
        let clock = clock();
        let (nodes, clients) = connected(&clock, &[(0, 2..=4), (1, 0..=6)]);
        let mut scheduler = scheduler(&nodes);
        let (node, block) = scheduler.earliest().unwrap();
        assert_eq!(node.index(), 0);
        assert_eq!(block, 2);

        for client in &clients {
            client.set_range(None);
        }
        assert!(matches!(scheduler.earliest().unwrap_err(), Error::NoBlocks));
    }

    #[test]
    fn test_close() {
        let clock = clock();
        let (nodes, clients) = connected(&clock, &[(0, 0..=4), (1, 0..=6)]);
        let mut scheduler = scheduler(&nodes);
        scheduler.close();
        assert!(clients.iter().all(|client| client.closed()));
    }
}
