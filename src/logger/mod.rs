//! `tracing` setup: a console layer and an optional rotating file layer.

pub mod compression;
pub mod config;
pub(crate) mod writer;

pub use config::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig, RotationConfig};

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use writer::RotatingFileWriter;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber. Fails if one is already set.
pub fn init_logger(config: &LoggerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    // The file layer goes first so console ANSI settings do not leak into it
    if config.file.enabled {
        let writer = RotatingFileWriter::new(&config.file)?;
        let layer = fmt::layer().with_ansi(false).with_target(true).with_writer(writer);
        layers.push(match config.file.format {
            LogFormat::Full => layer.boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    if config.console.enabled {
        let ansi = config.console.colored && std::io::stdout().is_terminal();
        layers.push(fmt::layer().with_ansi(ansi).with_target(true).boxed());
    }

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    Ok(())
}
