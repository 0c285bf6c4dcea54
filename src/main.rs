mod app;
mod cli;

use std::process;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TRANSQ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = cli::parse();
    if let Err(e) = app::run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
