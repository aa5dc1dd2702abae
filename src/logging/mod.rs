pub mod ndjson;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the stderr tracing subscriber; `level` is an `EnvFilter` directive.
pub fn init(level: &str) -> Result<()> {
    let filter = filter_for(level)?;
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install log subscriber: {}", e))?;

    Ok(())
}

fn filter_for(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| anyhow::anyhow!("invalid log level {level:?}: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_levels_and_target_directives() {
        assert!(filter_for("debug").is_ok());
        assert!(filter_for("hosttrack=trace,warn").is_ok());
    }

    #[test]
    fn rejects_malformed_level() {
        let err = filter_for("hosttrack=loud").unwrap_err();
        assert!(format!("{err}").contains("invalid log level"));
    }
}
