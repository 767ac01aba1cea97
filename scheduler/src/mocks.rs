//! Block nodes and oracles for tests.

use crate::{Error, Oracle as OracleTrait};
use blockstream_verifier::{mocks, read, Block};
use std::{
    ops::RangeInclusive,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Consensus time (in seconds) of block 0.
const GENESIS: i64 = 1_700_000_000;

/// Seconds between the consensus timestamps of consecutive blocks.
const SPACING: i64 = 2;

struct State {
    range: Option<RangeInclusive<u64>>,
    fail_status: bool,
    fail_stream: bool,
    panics: usize,
    delay: Duration,
    streams: usize,
    closed: bool,
}

/// An in-memory block node.
///
/// Every block it serves completes `delay` after its consensus ends, so the latency measured for
/// this node equals the configured delay. Clones share state.
#[derive(Clone)]
pub struct Client {
    state: Arc<Mutex<State>>,
}

impl Client {
    /// Creates a node that serves `range`.
    pub fn new(range: RangeInclusive<u64>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                range: Some(range),
                fail_status: false,
                fail_stream: false,
                panics: 0,
                delay: Duration::ZERO,
                streams: 0,
                closed: false,
            })),
        }
    }

    pub fn set_range(&self, range: Option<RangeInclusive<u64>>) {
        self.state.lock().unwrap().range = range;
    }

    /// Sets the time between the end of consensus and the arrival of each served block.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn fail_status(&self, fail: bool) {
        self.state.lock().unwrap().fail_status = fail;
    }

    pub fn fail_stream(&self, fail: bool) {
        self.state.lock().unwrap().fail_stream = fail;
    }

    /// Makes the next `times` status requests panic.
    pub fn panic_status(&self, times: usize) {
        self.state.lock().unwrap().panics = times;
    }

    /// Returns the number of streams opened (including failed ones).
    pub fn streams(&self) -> usize {
        self.state.lock().unwrap().streams
    }

    pub fn closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn block(number: u64, delay: Duration) -> Result<Block, Error> {
        let mut block = mocks::block(number, GENESIS + number as i64 * SPACING, [[0; 48]; 3]);
        let summary = read(&block)?;
        block.completed = summary.consensus_end + delay;
        Ok(block)
    }
}

impl crate::Client for Client {
    fn status(&self) -> Result<Option<RangeInclusive<u64>>, Error> {
        let mut state = self.state.lock().unwrap();
        if state.panics > 0 {
            state.panics -= 1;
            drop(state);
            panic!("status request panicked");
        }
        if state.fail_status {
            return Err(Error::Transport("status unavailable".into()));
        }
        Ok(state.range.clone())
    }

    fn stream(
        &self,
        start: u64,
        end: Option<u64>,
        _timeout: Duration,
        on_block: &mut dyn FnMut(Block) -> bool,
    ) -> Result<(), Error> {
        let (range, delay) = {
            let mut state = self.state.lock().unwrap();
            state.streams += 1;
            if state.fail_stream {
                return Err(Error::Transport("stream reset".into()));
            }
            (state.range.clone(), state.delay)
        };
        let Some(range) = range else {
            return Ok(());
        };
        let end = end.map_or(*range.end(), |end| end.min(*range.end()));
        for number in start.max(*range.start())..=end {
            if !on_block(Self::block(number, delay)?) {
                break;
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

/// An [OracleTrait] whose answer is set by the test.
#[derive(Default)]
pub struct Oracle {
    next: Mutex<Option<u64>>,
}

impl Oracle {
    pub fn new(next: Option<u64>) -> Self {
        Self {
            next: Mutex::new(next),
        }
    }

    pub fn set(&self, next: Option<u64>) {
        *self.next.lock().unwrap() = next;
    }
}

impl OracleTrait for Oracle {
    fn next_block_number(&self) -> Option<u64> {
        *self.next.lock().unwrap()
    }
}
