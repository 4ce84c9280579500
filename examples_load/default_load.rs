use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use ecs_log_layer::{EcsConfig, EcsLayer};

fn main() {
    let layer = EcsLayer::with_writer(EcsConfig::default(), io::sink);
    let written = Arc::clone(&layer.written_events);
    tracing::subscriber::set_global_default(Registry::default().with(layer))
        .expect("no global subscriber installed yet");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: encoded {} events in {:?} (~{:.0} ev/s)",
        written.load(Ordering::Relaxed),
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}
