use clap::Parser;
use client::messenger::Messenger;
use client::SessionEnd;
use log::info;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = shared::default_server_addr())]
    server: String,

    /// Display name; asked for on stdin when omitted
    #[arg(short = 'n', long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let mut input = BufReader::new(stdin());

    let name = match args.name {
        Some(name) => name,
        None => {
            println!("Enter a name to use");
            let mut line = String::new();
            input.read_line(&mut line).await?;
            line.trim().to_string()
        }
    };

    info!("Connecting to: {}", args.server);
    let messenger = Messenger::connect(&args.server, &name).await?;
    println!("Type a message and press Enter; \"quit\" or \"exit\" leaves the chat.");

    let end = messenger
        .run(input, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if end == SessionEnd::Interrupted {
        println!();
    }
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
