// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! routeprobe demo - instruments a simulated HTTP application and prints
//! what the probe publishes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::Level;

use routeprobe::config::{self, ProbeConfig};
use routeprobe::framework::{Application, Args, CallShape, Callback, FrameworkModule};
use routeprobe::probe::http::{http_probe, FRAMEWORK_NAME};
use routeprobe::probe::ProbeSet;
use routeprobe::report::channel::drain;
use routeprobe::report::{Published, Stream};
use routeprobe::telemetry::{init_telemetry, TelemetryConfig};

/// routeprobe version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// routeprobe - watch an instrumented HTTP application report its requests.
#[derive(Parser)]
#[command(name = "routeprobe")]
#[command(author, version, about = "Instrument a simulated HTTP application", long_about = None)]
struct Cli {
    /// Config file (defaults to the workspace or global config)
    #[arg(short, long, env = "ROUTEPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of concurrent requests to fire
    #[arg(short = 'n', long, default_value_t = 8)]
    requests: usize,

    /// Route pattern passed as the first argument
    #[arg(short, long, default_value = "/users")]
    route: String,

    /// Dispatch method to call (get and post complete by callback, head on return)
    #[arg(short, long, default_value = "get")]
    method: String,

    /// Simulated handler latency in milliseconds
    #[arg(long, default_value_t = 5)]
    latency_ms: u64,

    /// Switch off a report stream (metrics or requests)
    #[arg(long, value_name = "STREAM")]
    disable: Vec<Stream>,

    /// Print published records as JSON lines
    #[arg(short, long)]
    json: bool,

    /// Show probe logs
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Show trace output
    #[arg(long)]
    trace: bool,

    /// Log filter directive, e.g. `routeprobe::probe=trace`
    #[arg(long, env = "ROUTEPROBE_LOG")]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Subcommands for routeprobe.
#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration
    Config,

    /// Write a default .routeprobe.json to the current directory
    Init,

    /// List the dispatch methods the HTTP probe intercepts
    Methods,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    let _telemetry = init_telemetry(&telemetry_config(&cli))?;

    if let Some(command) = cli.command.take() {
        return handle_command(command, cli.config.as_deref());
    }

    let workspace_root = std::env::current_dir()?;
    let config = config::load_config_from(cli.config.as_deref(), &workspace_root)?;

    run_demo(&cli, &config).await
}

fn telemetry_config(cli: &Cli) -> TelemetryConfig {
    let config = if cli.json {
        TelemetryConfig::production()
    } else if cli.verbose || cli.trace {
        TelemetryConfig::development()
    } else {
        TelemetryConfig::default().with_level(Level::WARN)
    };
    let config = if cli.trace {
        config.with_level(Level::TRACE)
    } else {
        config
    };
    match &cli.log_filter {
        Some(filter) => config.with_filter(filter.clone()),
        None => config,
    }
}

fn handle_command(command: Commands, config_path: Option<&Path>) -> anyhow::Result<()> {
    let workspace_root = std::env::current_dir()?;
    match command {
        Commands::Config => {
            let config = config::load_config_from(config_path, &workspace_root)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Init => {
            let path = config::save_workspace_config(&workspace_root, &ProbeConfig::default())?;
            println!("Created config file: {}", path.display());
        }
        Commands::Methods => {
            for method in routeprobe::probe::http::HTTP_DISPATCH_METHODS {
                println!("{}", method);
            }
        }
        Commands::Version => {
            println!("routeprobe {}", VERSION);
        }
    }
    Ok(())
}

/// Build the simulated application: `get` and `post` answer through their
/// trailing callback after `latency`, `head` answers on return.
fn simulated_application(latency: Duration) -> Arc<Application> {
    let app = Arc::new(Application::new());
    let deferred = move |_args: Args, callback: Option<Callback>| -> Value {
        if let Some(callback) = callback {
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                callback(vec![Value::Null, json!(200)]);
            });
        }
        Value::Null
    };
    app.define("get", CallShape::Callback, deferred)
        .define("post", CallShape::Callback, deferred)
        .define("head", CallShape::Sync, |_args: Args, _callback: Option<Callback>| {
            json!(200)
        });
    app
}

async fn run_demo(cli: &Cli, config: &ProbeConfig) -> anyhow::Result<()> {
    let probe = Arc::new(http_probe().config(config).build());
    let mut receiver = probe
        .subscribe()
        .context("probe was built without its own channel")?;
    for stream in &cli.disable {
        probe.disable(*stream);
    }

    let mut probes = ProbeSet::new();
    probes.register(probe.clone());

    let app = simulated_application(Duration::from_millis(cli.latency_ms));
    let target = FrameworkModule::new(Arc::clone(&app)).into_target();
    probes.attach_all(FRAMEWORK_NAME, target)?;

    if !cli.json {
        println!(
            "{} {} x{} on {}",
            "→".cyan(),
            cli.method.bright_white(),
            cli.requests,
            cli.route.bright_white()
        );
    }

    let mut requests = JoinSet::new();
    for _ in 0..cli.requests {
        let app = Arc::clone(&app);
        let method = cli.method.clone();
        let route = cli.route.clone();
        requests.spawn(async move { fire_request(&app, &method, &route).await });
    }
    while let Some(joined) = requests.join_next().await {
        joined??;
    }

    print_records(&drain(&mut receiver), probe.topic(), cli.json)?;
    Ok(())
}

/// Call `method` with `route`, waiting for the trailing callback when the
/// method has one.
async fn fire_request(app: &Application, method: &str, route: &str) -> anyhow::Result<()> {
    let args = vec![json!(route)];
    if app.call_shape(method) != Some(CallShape::Callback) {
        app.invoke(method, args, None)?;
        return Ok(());
    }

    let (tx, rx) = oneshot::channel();
    let callback: Callback = Box::new(move |values: Args| {
        let _ = tx.send(values);
    });
    app.invoke(method, args, Some(callback))?;
    rx.await?;
    Ok(())
}

fn print_records(records: &[Published], metrics_topic: &str, json: bool) -> anyhow::Result<()> {
    if json {
        for published in records {
            println!("{}", serde_json::to_string(published)?);
        }
        return Ok(());
    }

    for published in records {
        println!(
            "{} {}",
            format!("[{}]", published.topic).bright_cyan(),
            serde_json::to_string(&published.record)?
        );
    }
    let metrics = records.iter().filter(|p| p.topic == metrics_topic).count();
    println!(
        "\n{} {} records ({} metrics, {} spans)",
        "✓".green(),
        records.len(),
        metrics,
        records.len() - metrics
    );
    Ok(())
}
