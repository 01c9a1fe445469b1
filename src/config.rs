use tracing::warn;

use crate::heap::{DEFAULT_ALLOC_BATCH, DEFAULT_GC_EVENTS};

/// Interpreter tuning knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Allocations between automatic collections.
    pub gc_events: usize,
    /// Slots requested from the host allocator per growth step.
    pub alloc_batch: usize,
    /// Cap on reserved heap slots for the default allocator. None = unbounded.
    pub heap_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gc_events: DEFAULT_GC_EVENTS,
            alloc_batch: DEFAULT_ALLOC_BATCH,
            heap_limit: None,
        }
    }
}

impl Config {
    /// Defaults overridden by `TINYLISP_GC_EVENTS`, `TINYLISP_ALLOC_BATCH`
    /// and `TINYLISP_HEAP_LIMIT`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(n) = env_usize("TINYLISP_GC_EVENTS") {
            config.gc_events = n;
        }
        if let Some(n) = env_usize("TINYLISP_ALLOC_BATCH") {
            config.alloc_batch = n;
        }
        if let Some(n) = env_usize("TINYLISP_HEAP_LIMIT") {
            config.heap_limit = Some(n);
        }
        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!(key, value = %raw, "ignoring invalid setting");
            None
        }
    }
}
