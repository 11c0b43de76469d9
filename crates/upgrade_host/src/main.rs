mod app;

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;

fn main() -> ExitCode {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let scenario_path = match parse_args(&args) {
        Ok(Some(path)) => path,
        Ok(None) => {
            println!("{}", usage_text());
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            return ExitCode::from(2);
        }
    };

    app::init_tracing();
    let wiring = match app::build_app(&scenario_path, app::HostConfig::from_env()) {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    match app::run(wiring, &mut io::stdout().lock()) {
        Ok(report) if report.succeeded() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "host_failed");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<PathBuf>, String> {
    match args {
        [] => Err("missing scenario file".to_string()),
        [flag] if flag == "-h" || flag == "--help" => Ok(None),
        [path] if path.starts_with('-') => Err(format!("unknown option '{path}'")),
        [path] => Ok(Some(PathBuf::from(path))),
        [_, extra, ..] => Err(format!("unexpected argument '{extra}'")),
    }
}

fn usage_text() -> String {
    [
        "upgrade_host - headless auto-upgrade runner",
        "",
        "Usage:",
        "  upgrade_host <scenario.json>",
        "  upgrade_host -h | --help",
        "",
        "Environment:",
        "  RUST_LOG                  log filter (default: info)",
        "  UPGRADE_MAX_TICKS         tick budget for the whole run",
        "  UPGRADE_COMMAND_LATENCY   ticks before a submitted command resolves",
        "  UPGRADE_RETRY_CAP         max depot send passes before bailing out",
    ]
    .join("\n")
}
