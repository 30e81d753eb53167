//! Client driver binary: registers with the name server, then runs an
//! interactive command loop over stdin (spec.md §6 CLI surface).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use sentra::client::commands::{self, Command};
use sentra::client::NsConnection;
use sentra::config::ClientConfig;

#[derive(Parser, Debug)]
#[command(about = "Sentra client")]
struct Args {
    #[arg(long, default_value = "client.toml")]
    config: PathBuf,

    #[arg(long)]
    name_server_addr: Option<SocketAddr>,

    #[arg(long)]
    username: Option<String>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = ClientConfig::load(&args.config);
    if let Some(v) = args.name_server_addr {
        config.name_server_addr = v;
    }
    if let Some(v) = args.username {
        config.username = v;
    }

    let username = if config.username.is_empty() {
        prompt_username().await?
    } else {
        config.username
    };

    let mut ns = match NsConnection::connect(config.name_server_addr, username.clone()).await {
        Ok(ns) => ns,
        Err(e) => {
            eprintln!("Failed to connect to name server: {e}");
            std::process::exit(1);
        }
    };

    // A client-facing port is not meaningfully used by this driver (it
    // never listens), but the registration protocol still carries one.
    let reply = ns.register(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
    if reply.error_code != sentra::wire::ErrorCode::Success {
        eprintln!("{}", sentra::client::format_error("REGISTER", &reply));
        std::process::exit(1);
    }

    println!("Welcome, {username}!");
    run_repl(&mut ns).await
}

async fn prompt_username() -> std::io::Result<String> {
    print!("Enter your username: ");
    use std::io::Write;
    std::io::stdout().flush()?;

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

async fn run_repl(ns: &mut NsConnection) -> std::io::Result<()> {
    let mut reader = BufReader::new(tokio::io::stdin());
    loop {
        print!("{}> ", ns.username);
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cmd = match commands::parse_line(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        if matches!(cmd, Command::Exit) {
            println!("Goodbye!");
            break;
        }

        match commands::run(ns, cmd).await? {
            Some(output) => println!("{output}"),
            None => break,
        }
    }
    Ok(())
}
