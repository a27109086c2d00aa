//! File-level driver tests: scripts read from disk, result records written
//! back out, compared byte for byte.

use std::fs;
use std::io::BufWriter;

use ramctl::{runner, script};
use rampool::{MemoryPool, Policy, MEMORY_SIZE};

fn pool(policy: Policy) -> MemoryPool {
    MemoryPool::setup(policy, vec![0u8; MEMORY_SIZE].into_boxed_slice()).unwrap()
}

/// Parse a script file, replay it, and return the result file's contents.
fn replay_files(policy: Policy, script_text: &str) -> String {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("trace.txt");
    fs::write(&input_path, script_text).unwrap();

    let input = fs::read_to_string(&input_path).unwrap();
    let ops = script::parse_script(&input).unwrap();

    let result_path = dir.path().join("result.txt");
    let file = fs::File::create(&result_path).unwrap();
    let mut out = BufWriter::new(file);
    let mut pool = pool(policy);
    runner::run_script(&mut pool, &ops, &mut out).unwrap();
    drop(out);

    fs::read_to_string(&result_path).unwrap()
}

#[test]
fn buddy_trace_round_trips_through_files() {
    let record = replay_files(
        Policy::Buddy,
        "a 1 M 100\nb 2 M 100\na 1 F\nb 1 F\nb 2 F\n",
    );
    assert_eq!(
        record,
        "Start of first Chunk a is: 8\n\
         Start of Chunk b is: 520\n\
         Start of Chunk b is: 1032\n\
         freed object a at 8\n\
         freed object b at 520\n\
         freed object b at 1032\n"
    );
}

#[test]
fn slab_trace_spills_into_a_second_chunk() {
    // 64 objects fill the first 4096-byte slab; the 65th opens another
    let record = replay_files(Policy::Slab, "x 65 M 32\n");
    let mut expected = String::new();
    for i in 0..64u64 {
        expected.push_str(&format!("Start of first Chunk x is: {}\n", 16 + 40 * i));
    }
    expected.push_str("Start of first Chunk x is: 4112\n");
    assert_eq!(record, expected);
}

#[test]
fn identical_traces_produce_identical_records() {
    let script = "a 5 M 700\nb 3 M 64\na 2 F\nc 4 M 1500\nb 1 F\na 1 F\n";
    let first = replay_files(Policy::Buddy, script);
    let second = replay_files(Policy::Buddy, script);
    assert_eq!(first, second);
    let slab_first = replay_files(Policy::Slab, script);
    let slab_second = replay_files(Policy::Slab, script);
    assert_eq!(slab_first, slab_second);
}

#[test]
fn malformed_scripts_fail_before_any_replay() {
    assert!(script::parse_script("a 1 M 100\nnonsense\n").is_err());
    assert!(script::parse_script("a -2 M 100\n").is_err());
    assert!(script::parse_script("a 1 Q 100\n").is_err());
}
