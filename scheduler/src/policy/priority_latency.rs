use super::{after, walk, Scheduler, Target, Tracker};
use crate::{Client, Config, Error, Node, Prober};
use blockstream_utils::Clock;
use blockstream_verifier::{Block, Summary};
use prometheus_client::registry::Registry;
use std::{collections::BTreeMap, sync::Arc};

/// Selects the lowest latency node within the highest priority tier that has the block.
///
/// Tiers are walked in ascending priority. Only nodes in the current node's tier compete with it,
/// so a reschedule never moves to a lower priority tier while the current tier can serve blocks.
pub struct PriorityThenLatency<E: Clock, C: Client> {
    groups: BTreeMap<i32, Vec<Arc<Node<E, C>>>>,
    tracker: Tracker<E, C>,
}

impl<E: Clock, C: Client> PriorityThenLatency<E, C> {
    pub fn new(
        context: E,
        config: &Config,
        nodes: Vec<Arc<Node<E, C>>>,
        prober: Prober<E, C>,
        registry: &mut Registry,
    ) -> Self {
        let mut groups: BTreeMap<i32, Vec<_>> = BTreeMap::new();
        for node in nodes {
            groups.entry(node.priority()).or_default().push(node);
        }
        Self {
            groups,
            tracker: Tracker::new(context, config, prober, registry),
        }
    }
}

impl<E: Clock, C: Client> Scheduler<E, C> for PriorityThenLatency<E, C> {
    fn select(&mut self, target: Target) -> Result<(Arc<Node<E, C>>, u64), Error> {
        self.tracker.cancel();
        for group in self.groups.values_mut() {
            group.sort_by_cached_key(|node| node.natural_key());
        }
        let groups = &self.groups;
        self.tracker
            .scheduled(walk(groups.values().flatten(), target), |current| {
                groups
                    .get(&current.priority())
                    .map(|group| after(group, current))
                    .unwrap_or_default()
            })
    }

    fn should_reschedule(&mut self, summary: &Summary, block: &Block) -> bool {
        self.tracker.should_reschedule(summary, block)
    }

    fn close(&mut self) {
        self.tracker.close();
        for node in self.groups.values().flatten() {
            node.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks,
        policy::tests::{clock, connected, nodes, observed, prober, TestNode},
    };
    use blockstream_utils::ManualClock;
    use std::{thread, time::Duration};

    fn scheduler(
        clock: &ManualClock,
        nodes: &[TestNode],
    ) -> (
        PriorityThenLatency<ManualClock, mocks::Client>,
        Prober<ManualClock, mocks::Client>,
    ) {
        let prober = prober();
        let scheduler = PriorityThenLatency::new(
            clock.clone(),
            &Config::default(),
            nodes.to_vec(),
            prober.clone(),
            &mut Registry::default(),
        );
        (scheduler, prober)
    }

    #[test]
    fn test_node() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=1), (0, 0..=1), (1, 0..=100), (1, 0..=100)]);
        let (mut scheduler, _) = scheduler(&clock, &nodes);
        assert_eq!(scheduler.node(0).unwrap().index(), 0);

        // Node 0 becomes slower than node 1
        nodes[0].record_latency(500);
        assert_eq!(scheduler.node(1).unwrap().index(), 1);

        // Neither priority 0 node has the block
        assert_eq!(scheduler.node(2).unwrap().index(), 2);

        // Node 2 becomes slower than node 3
        nodes[2].record_latency(600);
        assert_eq!(scheduler.node(3).unwrap().index(), 3);
    }

    #[test]
    fn test_higher_priority_missing_blocks() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=0), (0, 1..=1), (1, 2..=2), (1, 0..=100)]);
        let (mut scheduler, _) = scheduler(&clock, &nodes);
        for (block, index) in [(0, 0), (1, 1), (2, 2), (3, 3)] {
            assert_eq!(scheduler.node(block).unwrap().index(), index);
        }
    }

    #[test]
    fn test_priority_before_latency() {
        let clock = clock();
        let nodes = nodes(&clock, &[(1, 0..=100), (0, 0..=100)]);
        nodes[0].record_latency(10);
        nodes[1].record_latency(5_000);
        let (mut scheduler, _) = scheduler(&clock, &nodes);
        assert_eq!(scheduler.node(1).unwrap().index(), 1);
    }

    #[test]
    fn test_siblings_in_tier() {
        let clock = clock();
        let (nodes, clients) = connected(
            &clock,
            &[(0, 0..=100), (0, 0..=100), (0, 0..=100), (1, 0..=100)],
        );
        let (mut scheduler, prober) = scheduler(&clock, &nodes);
        assert_eq!(scheduler.node(1).unwrap().index(), 0);
        assert_eq!(prober.pending(), 2);
        assert_eq!(prober.generation(), 1);

        // Alone in its tier
        for client in &clients[..3] {
            client.set_range(Some(0..=1));
        }
        assert_eq!(scheduler.node(2).unwrap().index(), 3);
        assert_eq!(prober.pending(), 0);
        assert_eq!(prober.generation(), 2);
    }

    #[test]
    fn test_reschedule_within_tier() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=100), (0, 0..=100), (1, 0..=100)]);
        let (mut scheduler, _) = scheduler(&clock, &nodes);
        nodes[2].record_latency(0);
        nodes[1].record_latency(2_000);
        assert_eq!(scheduler.node(1).unwrap().index(), 0);

        // Node 2 is far faster but in a lower tier
        clock.advance(Duration::from_secs(10));
        let (summary, block) = observed(&clock, 2_900);
        assert!(!scheduler.should_reschedule(&summary, &block));

        let (summary, block) = observed(&clock, 3_300);
        assert!(scheduler.should_reschedule(&summary, &block));
        assert_eq!(scheduler.node(2).unwrap().index(), 1);
    }

    #[test]
    fn test_close() {
        let clock = clock();
        let (nodes, clients) = connected(&clock, &[(0, 0..=4), (0, 0..=6)]);
        let prober = Prober::new(
            Default::default(),
            Arc::new(mocks::Oracle::new(Some(1))),
            &mut Registry::default(),
        );
        let mut scheduler = PriorityThenLatency::new(
            clock.clone(),
            &Config::default(),
            nodes.clone(),
            prober.clone(),
            &mut Registry::default(),
        );
        scheduler.node(1).unwrap();
        assert_eq!(prober.pending(), 1);
        scheduler.close();
        assert!(clients.iter().all(|client| client.closed()));
        assert_eq!(prober.pending(), 0);

        // The prober's worker is stopped
        prober.set_nodes(nodes);
        for _ in 0..5 {
            prober.schedule();
        }
        thread::sleep(Duration::from_millis(10));
        assert!(clients.iter().all(|client| client.streams() == 0));
    }
}
