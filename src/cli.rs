use crate::{logging, run};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hosttrack", version)]
#[command(
    about = "Rebuild per-host query results from osquery differential logs",
    long_about = "hosttrack replays osqueryd differential result logs, reconstructs each host's query results, and checkpoints them as JSON snapshots committed to a git repository at event time."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  hosttrack /var/log/syslog
  hosttrack osqueryd.log --repo ~/fleet-history --window-secs 300
  hosttrack osqueryd.log --no-commit --final-flush --log checkpoints.ndjson")]
struct Cli {
    #[arg(value_name = "LOG_FILE", help = "Path to the log file to replay")]
    log_file: PathBuf,
    #[arg(
        long,
        default_value = ".",
        value_name = "DIR",
        help = "Repository holding the snapshot tree"
    )]
    repo: PathBuf,
    #[arg(
        long,
        value_name = "SECS",
        help = "Event-time seconds between checkpoints (default: 120)"
    )]
    window_secs: Option<i64>,
    #[arg(
        long,
        value_name = "TEXT",
        help = "Substring identifying agent lines (default: osqueryd)"
    )]
    marker: Option<String>,
    #[arg(
        long,
        value_name = "DIR",
        help = "Snapshot directory relative to --repo (default: data)"
    )]
    data_dir: Option<PathBuf>,
    #[arg(long, help = "Write snapshots without committing them")]
    no_commit: bool,
    #[arg(long, help = "Checkpoint whatever is still in memory at end of input")]
    final_flush: bool,
    #[arg(long, value_name = "PATH", help = "Append NDJSON checkpoint records to file")]
    log: Option<PathBuf>,
    #[arg(
        long,
        default_value = "info",
        value_name = "LEVEL",
        help = "Log filter (trace, debug, info, warn, error)"
    )]
    log_level: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;
    let cmd = run::RunCommand {
        log_file: cli.log_file,
        repo: cli.repo,
        window_secs: cli.window_secs,
        marker: cli.marker,
        data_dir: cli.data_dir,
        no_commit: cli.no_commit,
        final_flush: cli.final_flush,
        log: cli.log,
    };
    run::execute_run(cmd)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_log_file_is_enough() {
        let cli = Cli::try_parse_from(["hosttrack", "osqueryd.log"]).unwrap();
        assert_eq!(cli.log_file, PathBuf::from("osqueryd.log"));
        assert_eq!(cli.repo, PathBuf::from("."));
        assert!(cli.window_secs.is_none());
        assert!(!cli.no_commit);
    }

    #[test]
    fn parses_optional_flags() {
        let cli = Cli::try_parse_from([
            "hosttrack",
            "osqueryd.log",
            "--window-secs",
            "300",
            "--no-commit",
            "--final-flush",
            "--data-dir",
            "hosts",
        ])
        .unwrap();
        assert_eq!(cli.window_secs, Some(300));
        assert!(cli.no_commit);
        assert!(cli.final_flush);
        assert_eq!(cli.data_dir, Some(PathBuf::from("hosts")));
    }
}
