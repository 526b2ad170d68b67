//! This example simulates a sharded gateway client and a query proxy, and exposes their
//! metrics through the Prometheus exporter.
//!
//! Every shard runs on its own thread and reports overlapping member ids, so the distinct
//! user gauge stays well below the sum of the shard sizes. The example also gracefully
//! handles termination signals (Ctrl+C) to ensure clean shutdown.
//! The metrics are available on `0.0.0.0:9000` for inspection

#[cfg(feature = "tokio")]
fn main() {
    eprintln!("This example is not available when the Tokio feature is enabled.");
}

#[cfg(not(feature = "tokio"))]
fn main() {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use shard_metrics::{
        GatewayEvent, GatewayMetrics, MetricsCollector, PoolCounters, QueryLatencyRecorder,
        QueryMetrics, StatementType, ThreadPoolCollector,
    };
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        thread,
        time::Duration,
    };

    const SHARDS: u32 = 4;

    // Set up the Prometheus exporter.
    PrometheusBuilder::new()
        .install()
        .expect("Failed to install Prometheus recorder");

    let gateway = Arc::new(GatewayMetrics::new());
    let queries = Arc::new(QueryMetrics::new(
        "main",
        Arc::new(QueryLatencyRecorder::new()),
    ));

    let workers = Arc::new(PoolCounters::new());
    let pools = Arc::new(ThreadPoolCollector::new());
    pools.add_pool("shards", workers.clone());

    let collector = MetricsCollector::new()
        .register(gateway.clone())
        .register(queries.clone())
        .register(pools)
        .period(Duration::from_secs(5));
    let handle = match collector.start_collecting() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start metrics collector: {e}");
            return;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    // Handle Ctrl+C to exit gracefully.
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    gateway.set_session_start_limit(1_000, 1_000 - u64::from(SHARDS));

    let shards: Vec<_> = (0..SHARDS)
        .map(|shard_id| {
            let gateway = gateway.clone();
            let queries = queries.clone();
            let workers = workers.clone();
            let running = running.clone();
            workers.on_queued();
            thread::spawn(move || {
                workers.on_started();
                gateway
                    .handle_event(&GatewayEvent::ShardConnected { shard_id })
                    .expect("shard ids are unique");
                let mut entity_id = u64::from(shard_id) * 1_000;
                while running.load(Ordering::SeqCst) {
                    // Neighbouring shards see half of each other's members.
                    entity_id = u64::from(shard_id) * 1_000 + (entity_id + 7) % 2_000;
                    let _ = gateway.handle_event(&GatewayEvent::EntityObserved {
                        shard_id,
                        entity_id,
                    });
                    queries.on_statement_executed(StatementType::Prepared);
                    queries.on_statement(
                        "SELECT * FROM members WHERE id = ?",
                        true,
                        Duration::from_micros(entity_id % 5_000),
                    );
                    thread::sleep(Duration::from_millis(1));
                }
                let _ = gateway.handle_event(&GatewayEvent::WebsocketClosed {
                    shard_id,
                    code: 1000,
                });
                gateway.on_shard_disconnected(shard_id);
                workers.on_completed();
            })
        })
        .collect();

    println!("Gateway simulation is running. Press Ctrl+C to exit.");

    for shard in shards {
        let _ = shard.join();
    }
    handle.stop();

    println!("Shutting down gateway simulation.");
}
