//! Throughput metering for the detection loop.
//!
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

/// Counts inference passes and presented frames between reports.
#[derive(Default)]
pub struct Meter {
    inference_passes: AtomicU64,
    presented_frames: AtomicU64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            inference_passes: AtomicU64::new(0),
            presented_frames: AtomicU64::new(0),
        }
    }

    pub fn tick_inference(&self) {
        self.inference_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_presented(&self) {
        self.presented_frames.fetch_add(1, Ordering::Relaxed);
    }

    fn drain(&self) -> (u64, u64) {
        (
            self.inference_passes.swap(0, Ordering::Relaxed),
            self.presented_frames.swap(0, Ordering::Relaxed),
        )
    }
}

/// Log loop throughput every two seconds while the session is active.
pub fn spawn_meter_logger() -> JoinHandle<()> {
    tokio::spawn(async {
        let mut log_interval = interval(Duration::from_secs(2));
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let (passes, frames) = METER.drain();
            if passes == 0 && frames == 0 {
                continue;
            }

            let elapsed = start.elapsed().as_secs_f32();
            log::info!(
                "detection loop: {:.2} passes/s, {:.2} frames/s",
                passes as f32 / elapsed,
                frames as f32 / elapsed
            );
        }
    })
}
