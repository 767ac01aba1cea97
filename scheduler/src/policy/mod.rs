//! Policies for choosing the node to stream from.

use crate::{metrics, Client, Config, Error, Kind, Node, Prober};
use blockstream_utils::{Clock, SystemTimeExt};
use blockstream_verifier::{Block, Summary};
use prometheus_client::registry::Registry;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::{debug, info};

mod latency;
pub use latency::Latency;
mod priority;
pub use priority::Priority;
mod priority_latency;
pub use priority_latency::PriorityThenLatency;

/// What a selection is looking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// A node that can provide the given block.
    Block(u64),
    /// Any node with blocks, starting from the first block it has.
    Earliest,
}

impl Target {
    /// Returns the block `node` would start from, if it can serve this target.
    fn provided_by<E: Clock, C: Client>(&self, node: &Node<E, C>) -> Option<u64> {
        match self {
            Self::Block(block) => node.has_block(*block).then_some(*block),
            Self::Earliest => node.range().map(|range| *range.start()),
        }
    }

    fn unavailable(&self) -> Error {
        match self {
            Self::Block(block) => Error::NoNode(*block),
            Self::Earliest => Error::NoBlocks,
        }
    }
}

/// Chooses the [Node] that should provide the next block.
pub trait Scheduler<E: Clock, C: Client>: Send {
    /// Returns the first node, in the policy's order, that can serve `target` and the block to
    /// start from.
    ///
    /// Inactive nodes are skipped unless no active node can serve `target`, in which case the first
    /// inactive one that can is readmitted.
    fn select(&mut self, target: Target) -> Result<(Arc<Node<E, C>>, u64), Error>;

    /// Returns the node that should provide `block`.
    fn node(&mut self, block: u64) -> Result<Arc<Node<E, C>>, Error> {
        self.select(Target::Block(block)).map(|(node, _)| node)
    }

    /// Returns a node with blocks and the earliest block it has.
    fn earliest(&mut self) -> Result<(Arc<Node<E, C>>, u64), Error> {
        self.select(Target::Earliest)
    }

    /// Called after `block` (summarized by `summary`) was processed. Returns whether a new node
    /// should be selected.
    fn should_reschedule(&mut self, _summary: &Summary, _block: &Block) -> bool {
        false
    }

    /// Closes every node.
    fn close(&mut self);
}

/// Creates the scheduler named by `config.kind`.
///
/// Policies that do not measure latency never hand nodes to `prober`.
pub fn new<E: Clock, C: Client>(
    context: E,
    config: &Config,
    nodes: Vec<Arc<Node<E, C>>>,
    prober: Prober<E, C>,
    registry: &mut Registry,
) -> Box<dyn Scheduler<E, C>> {
    match config.kind {
        Kind::Priority => Box::new(Priority::new(nodes, registry)),
        Kind::Latency => Box::new(Latency::new(context, config, nodes, prober, registry)),
        Kind::PriorityThenLatency => Box::new(PriorityThenLatency::new(
            context, config, nodes, prober, registry,
        )),
    }
}

/// Walks `nodes` in order and returns the first that can serve `target`.
fn walk<'a, E: Clock, C: Client>(
    nodes: impl IntoIterator<Item = &'a Arc<Node<E, C>>>,
    target: Target,
) -> Result<(Arc<Node<E, C>>, u64), Error> {
    let mut inactive = Vec::new();
    for node in nodes {
        if !node.try_readmit(false) {
            inactive.push(node);
            continue;
        }
        if let Some(block) = target.provided_by(node) {
            return Ok((node.clone(), block));
        }
    }

    for node in inactive {
        if let Some(block) = target.provided_by(node) {
            node.try_readmit(true);
            return Ok((node.clone(), block));
        }
    }
    Err(target.unavailable())
}

/// Returns the nodes that follow `current` in `group`.
fn after<E: Clock, C: Client>(
    group: &[Arc<Node<E, C>>],
    current: &Arc<Node<E, C>>,
) -> Vec<Arc<Node<E, C>>> {
    group
        .iter()
        .position(|node| Arc::ptr_eq(node, current))
        .map(|position| group[position + 1..].to_vec())
        .unwrap_or_default()
}

/// Selection state shared by the latency-aware policies.
///
/// Tracks the current node and the nodes it competes with (its siblings), measures the current
/// node as blocks are processed and hands the siblings to the [Prober].
struct Tracker<E: Clock, C: Client> {
    context: E,
    prober: Prober<E, C>,

    max_post_processing_latency: Duration,
    min_reschedule_interval: Duration,
    threshold: u64,

    current: Option<Arc<Node<E, C>>>,
    siblings: Vec<Arc<Node<E, C>>>,
    last_scheduled: SystemTime,
    last_post_processing: Duration,

    metrics: metrics::Scheduler,
}

impl<E: Clock, C: Client> Tracker<E, C> {
    fn new(context: E, config: &Config, prober: Prober<E, C>, registry: &mut Registry) -> Self {
        let last_scheduled = context.current();
        Self {
            context,
            prober,
            max_post_processing_latency: config.max_post_processing_latency,
            min_reschedule_interval: config.min_reschedule_interval,
            threshold: config
                .reschedule_latency_threshold
                .as_millis()
                .min(u64::MAX as u128) as u64,
            current: None,
            siblings: Vec::new(),
            last_scheduled,
            last_post_processing: Duration::ZERO,
            metrics: metrics::Scheduler::init(registry),
        }
    }

    /// Stops probing the previous selection's siblings.
    fn cancel(&self) {
        self.prober.cancel_all();
    }

    /// Records the outcome of a selection. `group` returns the group the selected node competes in.
    fn scheduled(
        &mut self,
        result: Result<(Arc<Node<E, C>>, u64), Error>,
        group: impl FnOnce(&Arc<Node<E, C>>) -> Vec<Arc<Node<E, C>>>,
    ) -> Result<(Arc<Node<E, C>>, u64), Error> {
        let (node, block) = match result {
            Ok(selected) => selected,
            Err(err) => {
                self.current = None;
                self.siblings.clear();
                self.metrics.schedule_failed.inc();
                return Err(err);
            }
        };
        let siblings = group(&node);
        debug!(%node, block, siblings = siblings.len(), "selected node");
        self.prober.set_nodes(siblings.clone());
        self.current = Some(node.clone());
        self.siblings = siblings;
        self.last_scheduled = self.context.current();
        self.metrics.schedule.inc();
        Ok((node, block))
    }

    fn should_reschedule(&mut self, summary: &Summary, block: &Block) -> bool {
        let now = self.context.current();
        let previous = std::mem::replace(
            &mut self.last_post_processing,
            now.saturating_since(block.completed),
        );
        if previous > self.max_post_processing_latency {
            debug!(
                block = summary.number,
                post_processing = ?previous,
                "skipping latency measurement"
            );
            return false;
        }
        let Some(current) = &self.current else {
            return false;
        };

        current.record_latency(summary.latency(block.completed));
        if now.saturating_since(self.last_scheduled) < self.min_reschedule_interval {
            return false;
        }

        let latency = current.latency();
        let Some(faster) = self
            .siblings
            .iter()
            .find(|sibling| latency > sibling.latency().saturating_add(self.threshold))
        else {
            return false;
        };
        info!(
            %current,
            latency,
            %faster,
            faster_latency = faster.latency(),
            "rescheduling to a faster node"
        );
        self.metrics.reschedule.inc();
        true
    }

    /// Stops probing and the prober's worker.
    fn close(&self) {
        self.prober.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{mocks, NodeConfig, Properties};
    use blockstream_utils::ManualClock;
    use blockstream_verifier::{mocks as blocks, read};
    use std::{ops::RangeInclusive, time::UNIX_EPOCH};

    pub type TestNode = Arc<Node<ManualClock, mocks::Client>>;

    /// Returns a clock set to a realistic time.
    pub fn clock() -> ManualClock {
        ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }

    /// Returns nodes with the given priorities and ranges (in configuration order) and their
    /// clients.
    pub fn connected(
        clock: &ManualClock,
        specs: &[(i32, RangeInclusive<u64>)],
    ) -> (Vec<TestNode>, Vec<mocks::Client>) {
        specs
            .iter()
            .enumerate()
            .map(|(index, (priority, range))| {
                let client = mocks::Client::new(range.clone());
                let node = Arc::new(Node::new(
                    clock.clone(),
                    Properties {
                        endpoint: format!("node-{index}"),
                        priority: *priority,
                    },
                    index,
                    &NodeConfig::default(),
                    client.clone(),
                ));
                (node, client)
            })
            .unzip()
    }

    pub fn nodes(clock: &ManualClock, specs: &[(i32, RangeInclusive<u64>)]) -> Vec<TestNode> {
        connected(clock, specs).0
    }

    pub fn prober() -> Prober<ManualClock, mocks::Client> {
        Prober::new(
            Default::default(),
            Arc::new(mocks::Oracle::new(None)),
            &mut Registry::default(),
        )
    }

    /// Returns a block that completed now, `latency` milliseconds after its consensus ended.
    pub fn observed(clock: &ManualClock, latency: u64) -> (Summary, Block) {
        let mut block = blocks::block(1, 1_700_000_000, [[0; 48]; 3]);
        let mut summary = read(&block).unwrap();
        block.completed = clock.current();
        summary.consensus_end = block.completed - Duration::from_millis(latency);
        (summary, block)
    }

    /// Marks `node` inactive by failing enough streams.
    pub fn deactivate(node: &TestNode, client: &mocks::Client) {
        client.fail_stream(true);
        for _ in 0..NodeConfig::default().max_subscribe_attempts {
            let _ = node.stream(0, Some(0), Duration::from_secs(1), &mut |_| true);
        }
        client.fail_stream(false);
        assert!(!node.is_active());
    }

    fn tracker(clock: &ManualClock) -> Tracker<ManualClock, mocks::Client> {
        Tracker::new(
            clock.clone(),
            &Config::default(),
            prober(),
            &mut Registry::default(),
        )
    }

    #[test]
    fn test_walk_forced_readmit() {
        let clock = clock();
        let (nodes, clients) = connected(&clock, &[(0, 0..=10), (0, 5..=10), (0, 0..=3)]);
        deactivate(&nodes[0], &clients[0]);
        deactivate(&nodes[1], &clients[1]);

        // Inactive nodes are skipped while an active node has the block
        let (node, block) = walk(&nodes, Target::Block(2)).unwrap();
        assert_eq!(node.index(), 2);
        assert_eq!(block, 2);
        assert!(!nodes[0].is_active());

        // Otherwise the first inactive node with the block is readmitted
        let (node, _) = walk(&nodes, Target::Block(7)).unwrap();
        assert_eq!(node.index(), 0);
        assert!(nodes[0].is_active());
        assert!(!nodes[1].is_active());

        // Readmitted on its own once the delay passes
        clock.advance(NodeConfig::default().readmit_delay + Duration::from_millis(1));
        let (node, _) = walk(&nodes[1..], Target::Block(7)).unwrap();
        assert_eq!(node.index(), 1);
    }

    #[test]
    fn test_walk_unavailable() {
        let clock = clock();
        let (nodes, clients) = connected(&clock, &[(0, 0..=10), (1, 5..=10)]);
        let err = walk(&nodes, Target::Block(11)).unwrap_err();
        assert!(matches!(err, Error::NoNode(11)));
        assert_eq!(err.to_string(), "no block node can provide block 11");

        // Nodes without blocks can't serve the earliest block either
        for client in &clients {
            client.set_range(None);
        }
        assert!(matches!(
            walk(&nodes, Target::Earliest).unwrap_err(),
            Error::NoBlocks
        ));
    }

    #[test]
    fn test_walk_earliest() {
        let clock = clock();
        let (nodes, clients) = connected(&clock, &[(0, 3..=10), (1, 5..=10)]);
        let (node, block) = walk(&nodes, Target::Earliest).unwrap();
        assert_eq!(node.index(), 0);
        assert_eq!(block, 3);

        clients[0].fail_status(true);
        let (node, block) = walk(&nodes, Target::Earliest).unwrap();
        assert_eq!(node.index(), 1);
        assert_eq!(block, 5);
    }

    #[test]
    fn test_after() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=1), (0, 0..=1), (0, 0..=1)]);
        assert_eq!(after(&nodes, &nodes[0]).len(), 2);
        assert!(Arc::ptr_eq(&after(&nodes, &nodes[1])[0], &nodes[2]));
        assert!(after(&nodes, &nodes[2]).is_empty());

        // Not in the group
        let other = self::nodes(&clock, &[(0, 0..=1)]);
        assert!(after(&nodes, &other[0]).is_empty());
    }

    #[test]
    fn test_should_reschedule_without_selection() {
        let clock = clock();
        let mut tracker = tracker(&clock);
        let (summary, block) = observed(&clock, 5_000);
        assert!(!tracker.should_reschedule(&summary, &block));
    }

    #[test]
    fn test_should_reschedule() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=10), (0, 0..=10)]);
        let mut tracker = tracker(&clock);
        let selected = walk(&nodes, Target::Block(1));
        tracker
            .scheduled(selected, |node| after(&nodes, node))
            .unwrap();
        nodes[1].record_latency(1_000);

        // Too soon after the selection, but the latency is still recorded
        clock.advance(Duration::from_secs(9));
        let (summary, block) = observed(&clock, 2_500);
        assert!(!tracker.should_reschedule(&summary, &block));
        assert_eq!(nodes[0].latency(), 2_500);

        // Exactly the threshold apart
        clock.advance(Duration::from_secs(1));
        let (summary, block) = observed(&clock, 1_500);
        assert!(!tracker.should_reschedule(&summary, &block));
        assert_eq!(nodes[0].latency(), 2_000);

        // More than the threshold apart
        let (summary, block) = observed(&clock, 2_300);
        assert!(tracker.should_reschedule(&summary, &block));
        assert_eq!(nodes[0].latency(), 2_100);
    }

    #[test]
    fn test_slow_post_processing() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=10), (0, 0..=10)]);
        let mut tracker = tracker(&clock);
        let selected = walk(&nodes, Target::Block(1));
        tracker
            .scheduled(selected, |node| after(&nodes, node))
            .unwrap();
        clock.advance(Duration::from_secs(10));

        // Processed 2s after the block completed
        let (summary, mut block) = observed(&clock, 3_500);
        block.completed = clock.current() - Duration::from_secs(2);
        assert!(tracker.should_reschedule(&summary, &block));
        assert_eq!(nodes[0].latency(), 1_500);

        // The next measurement is discarded
        let (summary, block) = observed(&clock, 3_000);
        assert!(!tracker.should_reschedule(&summary, &block));
        assert_eq!(nodes[0].latency(), 1_500);

        // Measured again once post-processing is fast
        let (summary, block) = observed(&clock, 3_000);
        assert!(tracker.should_reschedule(&summary, &block));
        assert_eq!(nodes[0].latency(), 2_250);
    }

    #[test]
    fn test_failed_selection_clears_current() {
        let clock = clock();
        let nodes = nodes(&clock, &[(0, 0..=10)]);
        let mut tracker = tracker(&clock);
        let selected = walk(&nodes, Target::Block(1));
        tracker
            .scheduled(selected, |node| after(&nodes, node))
            .unwrap();
        assert!(tracker.current.is_some());

        let selected = walk(&nodes, Target::Block(20));
        assert!(tracker
            .scheduled(selected, |node| after(&nodes, node))
            .is_err());
        assert!(tracker.current.is_none());
        assert_eq!(tracker.metrics.schedule.get(), 1);
        assert_eq!(tracker.metrics.schedule_failed.get(), 1);

        clock.advance(Duration::from_secs(60));
        let (summary, block) = observed(&clock, 5_000);
        assert!(!tracker.should_reschedule(&summary, &block));
    }
}
