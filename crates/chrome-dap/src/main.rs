mod server;

use clap::Parser;
use server::DapServer;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "DAP server bridging editors to CDP targets")]
struct Args {
    /// Directory for the adapter log. Stdout belongs to the DAP channel, so
    /// diagnostics never go there.
    #[clap(long, default_value = "/tmp")]
    log_dir: std::path::PathBuf,

    /// Log file name inside the log directory.
    #[clap(long, default_value = "chrome-dap.log")]
    log_file: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_appender = tracing_appender::rolling::never(&args.log_dir, &args.log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    tracing::info!("chrome-dap starting");

    let server = DapServer::new();
    server.run(stdin(), stdout()).await?;

    Ok(())
}
