//! Script replay against a memory pool
//!
//! Replays a parsed operation sequence and writes the placement record the
//! result-file contract expects. Handle bookkeeping mirrors the driver
//! contract exactly: every `M` op appends a fresh handle even when a name
//! repeats, allocations are recorded at their 1-based index, and `F`
//! targets the first handle carrying the name.

use std::io::Write;

use anyhow::{bail, Result};
use rampool::{MemoryPool, PoolOffset};

use crate::script::Op;

/// Per-`M`-op allocation record
struct Handle {
    name: char,
    /// Slot 0 unused; allocation `i` lives at index `i`
    addresses: Vec<Option<PoolOffset>>,
    live: usize,
}

/// Counters reported after a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub allocs: usize,
    pub failed_allocs: usize,
    pub frees: usize,
}

/// Replay `ops` against `pool`, writing one record line per event to
/// `out`. Fails only on I/O errors or an `F` that names a slot which was
/// never filled (the script is self-inconsistent at that point).
pub fn run_script(pool: &mut MemoryPool, ops: &[Op], out: &mut impl Write) -> Result<RunSummary> {
    let mut handles: Vec<Handle> = Vec::new();
    let mut summary = RunSummary::default();

    for &op in ops {
        match op {
            Op::Alloc { name, count, size } => {
                run_alloc(pool, &mut handles, name, count, size, out, &mut summary)?
            }
            Op::Free { name, index } => {
                run_free(pool, &mut handles, name, index, out, &mut summary)?
            }
        }
    }
    Ok(summary)
}

fn run_alloc(
    pool: &mut MemoryPool,
    handles: &mut Vec<Handle>,
    name: char,
    count: usize,
    size: usize,
    out: &mut impl Write,
    summary: &mut RunSummary,
) -> Result<()> {
    // the very first handle gets a distinct greeting in the record
    let first = handles.is_empty();
    let mut handle = Handle {
        name,
        addresses: vec![None; count + 1],
        live: 0,
    };
    let mut failed = false;

    for i in 1..=count {
        match pool.alloc(size) {
            Some(off) => {
                handle.addresses[i] = Some(off);
                handle.live += 1;
                summary.allocs += 1;
                if first {
                    writeln!(out, "Start of first Chunk {} is: {}", name, off)?;
                } else {
                    writeln!(out, "Start of Chunk {} is: {}", name, off)?;
                }
            }
            None => {
                // abandon the rest of this op; a handle that recorded
                // nothing is dropped again below
                summary.failed_allocs += 1;
                log::warn!("allocation of {} bytes for handle {} failed", size, name);
                writeln!(out, "Allocation Error {}", name)?;
                failed = true;
                break;
            }
        }
    }

    if !(failed && handle.live == 0) {
        handles.push(handle);
    }
    Ok(())
}

fn run_free(
    pool: &mut MemoryPool,
    handles: &mut [Handle],
    name: char,
    index: usize,
    out: &mut impl Write,
    summary: &mut RunSummary,
) -> Result<()> {
    // unknown names are skipped, matching the driver contract
    let Some(handle) = handles.iter_mut().find(|h| h.name == name) else {
        log::warn!("free for unknown handle {} ignored", name);
        return Ok(());
    };
    let slot = handle.addresses.get_mut(index);
    let Some(off) = slot.and_then(Option::take) else {
        bail!(
            "invalid 'F' request: handle {} holds no allocation {}",
            name,
            index
        );
    };

    pool.free(off);
    handle.live -= 1;
    summary.frees += 1;
    writeln!(out, "freed object {} at {}", name, off)?;
    Ok(())
}
