use std::error::Error;
use std::fmt;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{error, info_span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use ecs_log_layer::{AdditionalField, EcsConfig, EcsLayer};

#[derive(Debug)]
struct Refused;

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection refused")
    }
}

impl Error for Refused {}

#[derive(Debug)]
struct UpstreamError(Refused);

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("upstream unavailable")
    }
}

impl Error for UpstreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

fn main() {
    let config = EcsConfig {
        service_name: Some("load-test".to_string()),
        service_environment: Some("bench".to_string()),
        include_origin: true,
        stack_trace_as_array: true,
        additional_fields: vec![AdditionalField::new("run", "custom")],
        ..Default::default()
    };
    let layer = EcsLayer::with_writer(config, io::sink);
    let written = Arc::clone(&layer.written_events);
    tracing::subscriber::set_global_default(Registry::default().with(layer))
        .expect("no global subscriber installed yet");

    let threads: u64 = 4;
    let per_thread: u64 = 25_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            thread::Builder::new()
                .name(format!("load-{t}"))
                .spawn(move || {
                    let span = info_span!("batch", worker = t);
                    let _enter = span.enter();
                    let err = UpstreamError(Refused);
                    for i in 0..per_thread {
                        error!(
                            iteration = i,
                            tags = "load,custom",
                            error = &err as &dyn Error,
                            "custom load test error"
                        );
                    }
                })
                .expect("spawn load thread")
        })
        .collect();

    for handle in handles {
        handle.join().expect("load thread panicked");
    }

    let n = threads * per_thread;
    let elapsed = start.elapsed();
    println!("custom config: encoded {} of {} events in {:?} (~{:.0} ev/s)",
        written.load(Ordering::Relaxed),
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}
