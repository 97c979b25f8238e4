use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solstice_host::{FeatureBinding, PluginHost, PluginHostConfig};

#[derive(Parser)]
#[command(name = "solstice")]
#[command(version, about = "Solstice plugin host console", long_about = None)]
struct Cli {
    /// Directory watched for plugin artifacts
    #[arg(short, long, env = "SOLSTICE_PLUGINS_DIRECTORY")]
    plugins_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("solstice={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = PluginHostConfig {
        // The console host runs lifecycle plugins, not request handlers;
        // a replaced instance has no in-flight consumers to wait for.
        enable_hot_swap: false,
        ..Default::default()
    };
    if let Some(dir) = cli.plugins_dir {
        config.directory = dir;
    }

    let host = PluginHost::new(config, FeatureBinding);

    // A failing start (unusable plugin directory, watcher failure) is
    // fatal and exits non-zero.
    host.start()?;

    println!(
        "Solstice plugin host running; watching {}",
        host.config().directory.display()
    );
    println!("Press 'q' then Enter to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(input)) if input.trim().eq_ignore_ascii_case("q") => break,
                    Ok(Some(_)) => continue,
                    // Stdin closed or unreadable: shut down.
                    Ok(None) | Err(_) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    host.dispose();
    println!("Goodbye.");
    Ok(())
}
