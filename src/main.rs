use anyhow::{Context, Result};
use clap::Parser;
use mfsbench::bench::{prepare_destination, run_benchmark};
use mfsbench::cli::{Backend, Cli, Command, OutputFormat};
use mfsbench::config::HarnessConfig;
use mfsbench::rpc::{KuboClient, MemoryMfs, MfsApi};
use mfsbench::setup::run_setup;
use mfsbench::strategy::standard_strategies;
use mfsbench::workload::Workload;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log to stderr at info level, or trace with --debug
fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn connect(backend: Backend, config: &HarnessConfig) -> Result<Box<dyn MfsApi>> {
    Ok(match backend {
        Backend::Kubo => Box::new(KuboClient::new(&config.daemon.api_url)?),
        Backend::Memory => Box::new(MemoryMfs::new()),
    })
}

async fn bench(api: &dyn MfsApi, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let bench = &config.bench;
    prepare_destination(api, bench).await?;

    let workload = Workload::generate(
        &bench.mfs_root,
        bench.file_count,
        bench.depth,
        bench.file_size,
    );
    info!(
        files = workload.len(),
        iterations = bench.iterations,
        "running MFS write benchmark"
    );
    let strategies = standard_strategies(bench);
    let report = run_benchmark(api, &strategies, bench.iterations, &workload).await?;

    match format {
        OutputFormat::Text => print!("{}", report.to_report_string()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

async fn setup(api: &dyn MfsApi, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let report = run_setup(api, &config.setup)
        .await
        .context("Error setting up MFS directory")?;
    match format {
        OutputFormat::Text => print!("{}", report.to_report_string()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_toml(path)?,
        None => HarnessConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    if args.backend == Backend::Memory {
        if let Command::Bench(_) = args.command {
            if config.bench.require_baseline {
                anyhow::bail!(
                    "The memory backend starts empty; pass --allow-empty-root to benchmark against it"
                );
            }
        }
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(async {
        let api = connect(args.backend, &config)?;
        match args.command {
            Command::Bench(_) => bench(api.as_ref(), &config, args.format).await,
            Command::Setup(_) => setup(api.as_ref(), &config, args.format).await,
        }
    })
}
