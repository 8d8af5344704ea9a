//! redmap-server - Development Server for Shared Maps
//!
//! Serves an in-process store over RESP so that several processes can
//! share redmap maps without an external Redis instance. Any
//! Redis-compatible client works against it too.

use redmap::server::Server;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: redmap::DEFAULT_HOST.to_string(),
            port: redmap::DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("redmap-server version {}", redmap::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
redmap-server - Development Server for Shared Maps

USAGE:
    redmap-server [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 6379)
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    redmap-server                  # Start on 127.0.0.1:6379
    redmap-server --port 6380      # Start on port 6380
    redmap-server --host 0.0.0.0   # Listen on all interfaces

CONNECTING:
    Point RespStore (or redis-cli) at the server:
    $ redis-cli -p 6379
    127.0.0.1:6379> HSET mymap greeting hello
    (integer) 1
    127.0.0.1:6379> HGET mymap greeting
    "hello"
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    println!(
        "redmap-server v{} listening on {} - ctrl-c to shut down",
        redmap::VERSION,
        config.bind_address()
    );

    let server = Server::bind(&config.bind_address()).await?;

    // Run until ctrl-c
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
        info!("shutdown signal received, stopping server");
    };

    tokio::select! {
        _ = server.run() => {}
        _ = shutdown => {}
    }

    info!("server shutdown complete");
    Ok(())
}
