use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use mmio_sockdev::{
    AccessPolicy, DEFAULT_PORT, JoinPolicy, MmioDevice, Server, ServerConfig, SockDevice,
};

/// MMIO device server: emulates the mmio-sockdev register block over TCP
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TCP port to listen on (always bound to 127.0.0.1)
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Close a connection that accesses beyond the register space instead of
    /// zero-filling reads and dropping writes
    #[arg(long)]
    strict: bool,

    /// On shutdown, wait for connected clients to hang up
    #[arg(long)]
    join_on_stop: bool,
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        ServerConfig {
            port: args.port,
            policy: if args.strict {
                AccessPolicy::Strict
            } else {
                AccessPolicy::Permissive
            },
            join_policy: if args.join_on_stop {
                JoinPolicy::Join
            } else {
                JoinPolicy::Detach
            },
        }
    }
}

fn print_banner(server: &Server<SockDevice>, config: &ServerConfig) {
    println!(
        "{}",
        format!("MMIO Device Server listening on {}", server.local_addr())
            .bright_cyan()
            .bold()
    );
    println!("Register map:");
    println!("  {} TXDATA (W): Print character", "0x00".bright_yellow());
    println!("  {} STATUS (R): TXREADY=1", "0x04".bright_yellow());
    println!("  {} CTRL (R/W): ENABLE bit", "0x08".bright_yellow());
    let size = server.device().lock().get_size();
    println!("  {size} bytes of register space, out-of-range accesses: {:?}", config.policy);
    println!("{}", "Waiting for QEMU connection...".dimmed());
}

fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig::from(&args);

    let server = Server::bind(&config, SockDevice::new(config.policy))
        .with_context(|| format!("Failed to start server on port {}", config.port))?;
    print_banner(&server, &config);

    server.run().context("Server error")
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
