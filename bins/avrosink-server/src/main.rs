use std::path::PathBuf;

use avrosink_api::SinkError;
use avrosink_avro::read_container;
use avrosink_config_hcl::HclParser;
use avrosink_engine::config::ConfigParser;
use avrosink_engine::naming::FileNameFormat;
use avrosink_engine::{SinkConfig, SinkSettings, TomlParser, open_storage};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "avrosink-server", about = "Stream JSON records into rotated Avro files")]
struct Cli {
    /// Path to configuration file (.toml or .hcl).
    #[arg(long, default_value = "config.toml", env = "AVROSINK_CONFIG", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read newline-delimited JSON records from stdin until EOF or Ctrl+C.
    Run {
        /// Records buffered between the stdin reader and the writer.
        #[arg(long, default_value_t = 1024)]
        buffer: usize,
    },
    /// List the output directory and decode every visible file.
    Inspect {
        /// Print every decoded record as a JSON line.
        #[arg(long)]
        records: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!(config = %cli.config.display(), "loading configuration");
    let settings = match SinkConfig::load_with(&cli.config, &[&TomlParser as &dyn ConfigParser, &HclParser])
        .and_then(|c| c.validate())
    {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let code = match cli.command.unwrap_or(Command::Run { buffer: 1024 }) {
        Command::Run { buffer } => run(settings, buffer).await,
        Command::Inspect { records } => inspect(&settings, records),
    };
    std::process::exit(code);
}

async fn run(settings: SinkSettings, buffer: usize) -> i32 {
    let (tx, rx) = mpsc::channel::<serde_json::Value>(buffer.max(1));
    let reader = tokio::spawn(read_stdin(tx));
    let mut writer = tokio::task::spawn_blocking(move || write_records(settings, rx));

    tracing::info!("avrosink-server started, press Ctrl+C to stop");
    let joined = tokio::select! {
        res = &mut writer => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down...");
            // Dropping the sender lets the writer drain and finalize.
            reader.abort();
            writer.await
        }
    };

    match joined {
        Ok(Ok(records)) => {
            tracing::info!(records, "stopped");
            0
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "sink failed");
            1
        }
        Err(e) => {
            tracing::error!(error = %e, "writer task panicked");
            1
        }
    }
}

/// Parse stdin lines into records. Lines that are not JSON are skipped.
async fn read_stdin(tx: mpsc::Sender<serde_json::Value>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => {
                if tx.send(record).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(line = line_no, error = %e, "skipping malformed line"),
        }
    }
    tracing::debug!(lines = line_no, "stdin closed");
}

/// Drive one engine until the channel closes. Returns the number of
/// records accepted.
fn write_records(
    settings: SinkSettings,
    mut rx: mpsc::Receiver<serde_json::Value>,
) -> Result<u64, SinkError> {
    let storage = open_storage(&settings.storage);
    let mut engine = settings.build_engine(storage);
    let mut accepted = 0u64;

    while let Some(record) = rx.blocking_recv() {
        match engine.on_record(&record) {
            Ok(outcome) => {
                accepted += 1;
                if let Some(path) = outcome.rotated {
                    tracing::debug!(path = %path.display(), "rotated");
                }
            }
            // Already logged by the engine.
            Err(e) if !e.is_fatal() => continue,
            Err(e) => return Err(e),
        }
    }

    engine.shutdown()?;
    Ok(accepted)
}

fn inspect(settings: &SinkSettings, print_records: bool) -> i32 {
    let storage = open_storage(&settings.storage);
    let dir = settings.naming.directory();
    let files = match storage.list(dir) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "failed to list output directory");
            return 1;
        }
    };

    let mut failed = false;
    for file in files {
        let decoded = storage.open(&file.path).and_then(read_container);
        match decoded {
            Ok(records) => {
                println!("{}\t{} bytes\t{} records", file.path.display(), file.len, records.len());
                if print_records {
                    for record in records {
                        println!("{record}");
                    }
                }
            }
            Err(e) => {
                failed = true;
                tracing::warn!(path = %file.path.display(), error = %e, "not a readable container");
            }
        }
    }
    i32::from(failed)
}
