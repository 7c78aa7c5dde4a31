//! Performance counters: count how many times we do various important
//! operations. Grounded on the teacher's `Op` + `EnumMap<Op, AtomicUsize>`
//! table, with `lazy_static` replaced by `std::sync::OnceLock` (no need
//! for an external crate for a single lazily-initialized static).

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering, fence};

use enum_map::{Enum, EnumMap};
use tracing::debug;

#[derive(Debug, Copy, Clone, Enum)]
pub enum Op {
    WalkErrorSkipped,
    TreeCacheHit,
    TreeCacheMiss,
    CodedIdReuseHit,
    BlockStored,
    BlockReused,
}

fn counter_map() -> &'static EnumMap<Op, AtomicUsize> {
    static MAP: OnceLock<EnumMap<Op, AtomicUsize>> = OnceLock::new();
    MAP.get_or_init(EnumMap::default)
}

#[inline]
pub fn bump(which: Op) {
    add(which, 1);
}

pub fn add(to: Op, amount: usize) {
    counter_map()[to].fetch_add(amount, Ordering::Relaxed);
}

pub fn log_counts() {
    fence(Ordering::SeqCst);

    let counts = counter_map()
        .iter()
        .map(|(k, v)| (k, v.load(Ordering::Relaxed)))
        .filter(|(_k, v)| *v > 0)
        .collect::<Vec<_>>();

    if counts.is_empty() {
        return;
    }

    let opname = |op| match op {
        Op::WalkErrorSkipped => "subdirectory scans skipped after an error",
        Op::TreeCacheHit => "tree cache hits",
        Op::TreeCacheMiss => "tree cache misses",
        Op::CodedIdReuseHit => "coded-ids reused from prior versions",
        Op::BlockStored => "blocks stored",
        Op::BlockReused => "blocks reused",
    };

    debug!("Counters:");
    for (op, count) in &counts {
        debug!("{:6} {}", count, opname(*op));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bump_and_add() {
        bump(Op::BlockStored);
        add(Op::BlockStored, 4);
        assert!(counter_map()[Op::BlockStored].load(Ordering::Relaxed) >= 5);
    }
}
