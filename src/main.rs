use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MODEWARD_LOG";

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

fn main() {
    modeward::plugins::diagnostics::mark_process_start();
    if let Err(e) = init_tracing() {
        eprintln!("warning: {:#}", e);
    }
    if let Err(e) = modeward::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
