//! Snowflake ID Generator
//!
//! Time-ordered 63-bit identifiers for chats and messages. Message ids are
//! used as pagination cursors, so ids from one generator never go backwards.

use chrono::Utc;
use parking_lot::Mutex;

/// Default epoch (2020-01-01T00:00:00.000Z)
pub const DEFAULT_EPOCH_MS: u64 = 1_577_836_800_000;

const MACHINE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const MACHINE_MASK: u64 = (1 << MACHINE_BITS) - 1;

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// Snowflake ID generator
#[derive(Debug)]
pub struct SnowflakeGenerator {
    machine_id: u64,
    epoch_ms: u64,
    state: Mutex<GeneratorState>,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u16, epoch_ms: u64) -> Self {
        Self {
            machine_id: u64::from(machine_id) & MACHINE_MASK,
            epoch_ms,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();
        // Clamp to the last issued timestamp so a clock step back cannot reorder ids.
        let mut timestamp = self.now_ms().max(state.last_timestamp);

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted within this millisecond; borrow the next one.
                timestamp += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        let id = ((timestamp - self.epoch_ms) << (MACHINE_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | state.sequence;

        id as i64
    }

    /// Extract the millisecond timestamp encoded in an id from this generator
    pub fn timestamp_of(&self, snowflake: i64) -> u64 {
        ((snowflake as u64) >> (MACHINE_BITS + SEQUENCE_BITS)) + self.epoch_ms
    }

    fn now_ms(&self) -> u64 {
        (Utc::now().timestamp_millis().max(0) as u64).max(self.epoch_ms)
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(1, DEFAULT_EPOCH_MS)
    }
}
