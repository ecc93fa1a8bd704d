use std::process::ExitCode;

use tracing_subscriber::{prelude::*, EnvFilter};

fn main() -> ExitCode {
    init_tracing();

    match facelabel::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so reports on stdout stay machine-readable.
/// `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
