use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogArgs;

/// Keeps the chrome trace writer alive; the trace is flushed on drop.
pub struct LogGuard {
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// query output.
pub fn init(args: &LogArgs) -> eyre::Result<LogGuard> {
    let filter = EnvFilter::try_new(&args.filter)
        .map_err(|e| eyre::eyre!("invalid log filter {:?}: {e}", args.filter))?;

    let (chrome, guard) = match &args.chrome_trace {
        Some(path) => {
            let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file(path)
                .include_args(true)
                .build();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(chrome)
        .try_init()?;

    Ok(LogGuard { _chrome: guard })
}
