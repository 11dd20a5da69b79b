//! Demo "instrumented" application.
//!
//! There is no bytecode weaving here: the instrumentation layer is played
//! by hand. Each traced function brackets its body with the tracer's hook
//! pair, exactly the calls a weaving agent would have inserted, after
//! checking the selector the way the agent checks it at class load.
//!
//! Run with: cargo run --example demo-app

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use calltrace::agent::{Agent, Tracer};
use calltrace::config::{AgentConfig, ClassRule, DiskGuardConfig, MethodRule, OutputConfig};

fn main() {
    env_logger::init();

    let stats_path = std::env::temp_dir().join("calltrace-demo.json");
    let config = AgentConfig {
        include: vec![
            ClassRule {
                class: "com.demo.*".to_string(),
                methods: vec![],
                track_parameters: None,
            },
            ClassRule {
                class: "com.demo.Repo".to_string(),
                methods: vec![MethodRule {
                    pattern: "find*".to_string(),
                    track_parameters: Some(true),
                }],
                track_parameters: None,
            },
        ],
        exclude: vec![ClassRule {
            class: "com.demo.util.*".to_string(),
            methods: vec![MethodRule {
                pattern: "log*".to_string(),
                track_parameters: None,
            }],
            track_parameters: None,
        }],
        debug_classes: HashSet::new(),
        min_duration_micros: 1_000,
        min_root_duration_micros: 5_000,
        track_parameters: false,
        output: OutputConfig {
            path: stats_path.clone(),
            truncate: true,
        },
        disk_guard: DiskGuardConfig {
            threshold_mb: 50,
            poll_interval_secs: 60,
        },
    };
    let agent = Agent::install(&config);

    // What the weaving step would decide per class load:
    let selector = agent.tracer().selector();
    println!("com.demo.App.handle tracked:      {}", selector.is_tracked("com.demo.App", "handle"));
    println!("com.demo.util.Log.logLine tracked: {}", selector.is_tracked("com.demo.util.Log", "logLine"));
    println!(
        "com.demo.Repo.findUser params:    {}\n",
        selector.should_track_parameters("com.demo.Repo", "findUser")
    );

    let workers: Vec<_> = (0..3)
        .map(|worker| {
            let tracer = Arc::clone(agent.tracer());
            thread::spawn(move || {
                for request in 0..2 {
                    handle_request(&tracer, worker, request);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }

    agent.shutdown();
    println!("wrote call trees to {}", stats_path.display());
    println!("summarize with: calltrace --summarize {}", stats_path.display());
}

/// Root of each traced call tree.
fn handle_request(tracer: &Tracer, worker: usize, request: usize) {
    let root = tracer.on_enter("com.demo.App.handle(int)", None, false);

    find_user(tracer, worker * 10 + request);
    render(tracer);

    tracer.on_exit(root, false);
}

fn find_user(tracer: &Tracer, id: usize) {
    // Parameter capture was enabled for find* at weave time.
    let handle = tracer.on_enter(
        "com.demo.Repo.findUser(int)",
        Some(vec![id.to_string()]),
        false,
    );
    thread::sleep(Duration::from_millis(3));
    query(tracer);
    tracer.on_exit(handle, false);
}

fn query(tracer: &Tracer) {
    let handle = tracer.on_enter("com.demo.Repo.query(String)", None, false);
    thread::sleep(Duration::from_millis(2));
    tracer.on_exit(handle, false);
}

fn render(tracer: &Tracer) {
    let handle = tracer.on_enter("com.demo.View.render()", None, false);
    thread::sleep(Duration::from_millis(1));
    tracer.on_exit(handle, false);
}
