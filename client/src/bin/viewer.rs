use clap::Parser;
use client::viewer::Viewer;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = shared::default_server_addr())]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Connecting to: {}", args.server);

    let (viewer, welcome) = Viewer::connect(&args.server).await?;
    println!("{}", welcome);
    println!("Press Ctrl+C to exit the Viewer at any time.");

    let end = viewer
        .run(
            async {
                let _ = tokio::signal::ctrl_c().await;
                println!("Disconnecting from the chat...");
            },
            |line| println!("{}", line),
        )
        .await;

    info!("Session ended: {:?}", end);
    println!("Disconnected");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults_to_default_port() {
        let args = Args::try_parse_from(["client"]).unwrap();
        assert_eq!(args.server, format!("127.0.0.1:{}", shared::DEFAULT_PORT));
    }
}
