use derive_more::Deref;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// Timestamp
///
/// Monotonically increasing marker used for cache staleness checks: a cache
/// entry is fresh for a transaction only if it was written before the
/// transaction began. Comparison is last-writer-wins, not linearizable.
///

#[derive(
    Clone, Copy, Debug, Default, Deref, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sub-millisecond slots available per clock tick.
const COUNTER_BITS: u32 = 12;
const ONE_MS: u64 = 1 << COUNTER_BITS;

///
/// Timestamper
///
/// Generates increasing identifiers: the millisecond clock shifted left
/// twelve bits, plus a counter disambiguating calls within one millisecond.
/// Identifiers are not strictly increasing across processes, but always are
/// within one.
///

#[derive(Debug, Default)]
pub struct Timestamper {
    state: Mutex<TimestamperState>,
}

#[derive(Debug, Default)]
struct TimestamperState {
    time: u64,
    counter: u64,
}

impl Timestamper {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(TimestamperState {
                time: 0,
                counter: 0,
            }),
        }
    }

    pub fn next(&self) -> Timestamp {
        let mut state = self.state.lock();

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
            << COUNTER_BITS;

        if state.time < now {
            state.time = now;
            state.counter = 0;
        } else if state.counter < ONE_MS - 1 {
            state.counter += 1;
        }

        Timestamp(state.time + state.counter)
    }
}
