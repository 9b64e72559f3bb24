use kvcontract::{Benchmark, Config, ContractSuite, LoadRunner};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Environment variable holding the config path when none is given on the command line
const CONFIG_ENV: &str = "KVCONTRACT_CONFIG";

const USAGE: &str = "usage: kvcontract <conformance|bench|load> [config.json]";

/// Harness selected on the command line
#[derive(Debug, Clone, Copy)]
enum Mode {
    Conformance,
    Bench,
    Load,
}

impl Mode {
    fn parse(word: &str) -> Option<Mode> {
        match word {
            "conformance" => Some(Mode::Conformance),
            "bench" => Some(Mode::Bench),
            "load" => Some(Mode::Load),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging (INFO by default, RUST_LOG refines it)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mode = match args.next().as_deref().and_then(Mode::parse) {
        Some(mode) => mode,
        None => {
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    let config_path = args
        .next()
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config = match config_path {
        Some(path) => match Config::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{:#}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    // One worker per CPU core, min 1, max 16
    let num_cpus = num_cpus::get();
    let workers = num_cpus.clamp(1, 16);
    info!("Detected {} CPU cores, using {} runtime workers", num_cpus, workers);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(mode, config)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run one harness; Ok(false) when the server broke its contract
async fn run(mode: Mode, config: Config) -> anyhow::Result<bool> {
    match mode {
        Mode::Conformance => {
            let report = ContractSuite::from_config(&config).run().await?;
            println!("{}", report);
            Ok(report.passed())
        }
        Mode::Bench => {
            let report = Benchmark::from_config(&config).run().await?;
            print!("{}", report.comparison_table());
            if let Some(path) = &config.bench.report_path {
                report.write_json(path)?;
                info!("Report written to {}", path.display());
            }
            Ok(true)
        }
        Mode::Load => {
            let token = CancellationToken::new();
            let interrupt = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping load");
                    interrupt.cancel();
                }
            });

            let summary = LoadRunner::from_config(&config).run_with_token(token).await?;
            println!("{}", summary);
            Ok(true)
        }
    }
}
