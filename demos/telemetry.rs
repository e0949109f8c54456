// In demos/telemetry.rs
//
// Demonstration driver: one thread publishes telemetry frames as fast as
// the jitter allows, the other samples the latest frame, verifies it is
// never torn, and reports how often the claim path had to retry. Run
// with `cargo run --example telemetry [num_frames]`.

use std::env;
use std::thread;
use std::time::Instant;

const LANES: usize = 16;

#[derive(Clone, Debug)]
struct Frame {
    seq: u64,
    lanes: [u64; LANES],
}

fn jitter(max: u32) {
    for _ in 0..fastrand::u32(..max) {
        std::hint::spin_loop();
    }
}

fn main() {
    let frames: u64 = env::args()
        .nth(1)
        .map(|arg| arg.parse().expect("Invalid number of frames"))
        .unwrap_or(1_000_000);

    println!("Publishing {} frames of {} lanes...", frames, LANES);

    let initial = Frame {
        seq: 0,
        lanes: [0; LANES],
    };
    let (mut writer, mut reader) = trilatch::latch(initial);

    let start = Instant::now();

    let producer = thread::spawn(move || {
        for seq in 1..=frames {
            let mut frame = writer.acquire_write();
            frame.seq = seq;
            frame.lanes = [seq; LANES];
            frame.publish();
            jitter(32);
        }
    });

    let consumer = thread::spawn(move || {
        let mut last = 0u64;
        let mut distinct = 0u64;
        let mut reads = 0u64;
        let mut retries = 0u64;
        let mut max_retries = 0u32;

        while last < frames {
            let frame = reader.read();
            assert!(
                frame.lanes.iter().all(|&lane| lane == frame.seq),
                "torn frame: {frame:?}"
            );
            assert!(frame.seq >= last, "stale frame {} after {}", frame.seq, last);
            if frame.seq > last {
                distinct += 1;
            }
            last = frame.seq;
            reads += 1;
            retries += u64::from(reader.retry_count());
            max_retries = max_retries.max(reader.retry_count());
            jitter(32);
        }

        (reads, distinct, retries, max_retries)
    });

    producer.join().unwrap();
    let (reads, distinct, retries, max_retries) = consumer.join().unwrap();

    let elapsed = start.elapsed();
    println!("Done in {:.2?}", elapsed);
    println!(
        "  publishes: {} ({:.2} million/sec)",
        frames,
        (frames as f64 / elapsed.as_secs_f64()) / 1_000_000.0
    );
    println!(
        "  reads: {} ({} distinct frames observed, {} skipped)",
        reads,
        distinct,
        frames - distinct
    );
    println!(
        "  claim retries: {} total, {} max in one read",
        retries, max_retries
    );
}
