//! ramctl — allocation-script driver for the rampool allocator
//!
//! Usage: `ramctl <policy> <input_file>` where `policy` is `0`/`buddy` or
//! `1`/`slab`. The placement record lands in
//! `output/result-<policy>-<basename>`; logging is steered by `RUST_LOG`.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;
use rampool::{
    MemoryPool, Policy, HEADER_SIZE, MEMORY_SIZE, MIN_MEM_CHUNK_SIZE, N_OBJS_PER_SLAB,
};

use ramctl::{runner, script};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let (Some(policy_arg), Some(input_path)) = (args.next(), args.next()) else {
        bail!("usage: ramctl <policy> <input_file>  (policy: 0|buddy, 1|slab)");
    };
    let policy = match policy_arg.as_str() {
        "0" | "buddy" => Policy::Buddy,
        "1" | "slab" => Policy::Slab,
        other => bail!("invalid policy `{}` (expected 0|buddy or 1|slab)", other),
    };

    info!("ramctl {} starting with {:?} policy", env!("CARGO_PKG_VERSION"), policy);
    info!(
        "MEMORY_SIZE: {}, HEADER_SIZE: {}, MIN_MEM_CHUNK_SIZE: {}, N_OBJS_PER_SLAB: {}",
        MEMORY_SIZE, HEADER_SIZE, MIN_MEM_CHUNK_SIZE, N_OBJS_PER_SLAB
    );

    let input = fs::read_to_string(&input_path)
        .with_context(|| format!("reading input script {}", input_path))?;
    let ops = script::parse_script(&input).context("parsing input script")?;

    let ram = vec![0u8; MEMORY_SIZE].into_boxed_slice();
    let mut pool = MemoryPool::setup(policy, ram).context("setting up the pool")?;

    let base = Path::new(&input_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_path.clone());
    fs::create_dir_all("output").context("creating the output directory")?;
    let result_path = format!("output/result-{}-{}", policy_arg, base);
    let file = fs::File::create(&result_path)
        .with_context(|| format!("creating result file {}", result_path))?;
    let mut out = BufWriter::new(file);

    let summary = runner::run_script(&mut pool, &ops, &mut out)?;
    out.flush().context("flushing the result file")?;

    let stats = pool.buddy().stats();
    info!(
        "run complete: {} allocations ({} failed), {} frees",
        summary.allocs, summary.failed_allocs, summary.frees
    );
    info!(
        "pool: {} of {} bytes still allocated under {:?} policy",
        stats.allocated_bytes,
        pool.size(),
        pool.policy()
    );
    info!("result file: {}", result_path);
    Ok(())
}
