//! A block node and what is known about its health and latency.

use crate::{Client, Config, Error, NodeConfig, Properties};
use blockstream_utils::{Clock, SystemTimeExt};
use blockstream_verifier::Block;
use std::{
    collections::VecDeque,
    fmt,
    ops::RangeInclusive,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};
use tracing::{debug, warn};

struct Health {
    active: bool,
    errors: usize,
    readmit: SystemTime,
}

/// Rolling mean of the most recent measurements.
struct Window {
    size: usize,
    samples: VecDeque<u64>,
}

impl Window {
    fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            samples: VecDeque::with_capacity(size),
        }
    }

    fn record(&mut self, sample: u64) {
        if self.samples.len() == self.size {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn mean(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let sum: u128 = self.samples.iter().map(|&sample| sample as u128).sum();
        (sum / self.samples.len() as u128) as u64
    }
}

/// A block node that can be streamed from.
///
/// Nodes are shared between a scheduler and the prober, so all mutable state is behind locks.
pub struct Node<E: Clock, C: Client> {
    context: E,
    client: C,
    properties: Properties,
    index: usize,

    max_subscribe_attempts: usize,
    readmit_delay: Duration,

    health: Mutex<Health>,
    latency: Mutex<Window>,
}

impl<E: Clock, C: Client> Node<E, C> {
    /// Creates an active node. `index` is the node's position in the configuration and breaks ties
    /// between otherwise equal nodes.
    pub fn new(
        context: E,
        properties: Properties,
        index: usize,
        config: &NodeConfig,
        client: C,
    ) -> Self {
        let now = context.current();
        Self {
            context,
            client,
            properties,
            index,
            max_subscribe_attempts: config.max_subscribe_attempts.max(1),
            readmit_delay: config.readmit_delay,
            health: Mutex::new(Health {
                active: true,
                errors: 0,
                readmit: now,
            }),
            latency: Mutex::new(Window::new(config.latency_window)),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.properties.endpoint
    }

    pub fn priority(&self) -> i32 {
        self.properties.priority
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Mean latency (in milliseconds) of the most recent measurements, or 0 if there are none.
    pub fn latency(&self) -> u64 {
        self.latency.lock().unwrap().mean()
    }

    /// Records a latency measurement in milliseconds.
    pub fn record_latency(&self, latency: u64) {
        self.latency.lock().unwrap().record(latency);
        debug!(node = %self, latency, "recorded latency");
    }

    pub fn is_active(&self) -> bool {
        self.health.lock().unwrap().active
    }

    /// Reactivates the node if `force` is set or its readmit time has passed. Returns whether the
    /// node is active.
    pub fn try_readmit(&self, force: bool) -> bool {
        let mut health = self.health.lock().unwrap();
        if !health.active && (force || self.context.current() > health.readmit) {
            health.active = true;
            debug!(node = %self, force, "readmitted node");
        }
        health.active
    }

    /// Returns the blocks the node can serve (`None` if it has none or its status is unavailable).
    pub fn range(&self) -> Option<RangeInclusive<u64>> {
        match self.client.status() {
            Ok(range) => range.filter(|range| !range.is_empty()),
            Err(err) => {
                warn!(node = %self, ?err, "failed to get status");
                None
            }
        }
    }

    /// Returns whether the node can serve `block`.
    pub fn has_block(&self, block: u64) -> bool {
        self.range().is_some_and(|range| range.contains(&block))
    }

    /// Streams blocks from the node (see [Client::stream]).
    ///
    /// Consecutive failures are counted. Once they reach the configured limit, the node is marked
    /// inactive until the readmit delay passes.
    pub fn stream(
        &self,
        start: u64,
        end: Option<u64>,
        timeout: Duration,
        on_block: &mut dyn FnMut(Block) -> bool,
    ) -> Result<(), Error> {
        match self.client.stream(start, end, timeout, on_block) {
            Ok(()) => {
                self.health.lock().unwrap().errors = 0;
                Ok(())
            }
            Err(err) => {
                self.on_error();
                Err(err)
            }
        }
    }

    /// Releases the node's connection.
    pub fn close(&self) {
        self.client.close();
    }

    fn on_error(&self) {
        let mut health = self.health.lock().unwrap();
        health.errors += 1;
        if health.errors < self.max_subscribe_attempts {
            return;
        }
        warn!(
            node = %self,
            attempts = self.max_subscribe_attempts,
            "failed to stream blocks consecutively, marking inactive"
        );
        health.active = false;
        health.errors = 0;
        health.readmit = self
            .context
            .current()
            .saturating_add_duration(self.readmit_delay);
    }

    /// Key of the natural order: priority, then latency, then configuration order.
    pub(crate) fn natural_key(&self) -> (i32, u64, usize) {
        (self.priority(), self.latency(), self.index)
    }

    /// Key of the latency order: latency, then the natural order.
    pub(crate) fn latency_key(&self) -> (u64, i32, usize) {
        (self.latency(), self.priority(), self.index)
    }
}

impl<E: Clock, C: Client> fmt::Display for Node<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.properties.endpoint)
    }
}

impl<E: Clock, C: Client> fmt::Debug for Node<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("endpoint", &self.properties.endpoint)
            .field("priority", &self.properties.priority)
            .field("index", &self.index)
            .finish()
    }
}

/// Creates a node for every entry of `config.nodes`, connecting each with `connect`.
pub fn nodes<E: Clock, C: Client>(
    context: &E,
    config: &Config,
    mut connect: impl FnMut(&Properties) -> C,
) -> Vec<Arc<Node<E, C>>> {
    config
        .nodes
        .iter()
        .enumerate()
        .map(|(index, properties)| {
            Arc::new(Node::new(
                context.clone(),
                properties.clone(),
                index,
                &config.node,
                connect(properties),
            ))
        })
        .collect()
}
