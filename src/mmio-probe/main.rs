use anyhow::{Context, Result, bail};
use clap::Parser;
use mmio_sockdev::{CTRL, Ctrl, DEFAULT_PORT, MmioClient, STATUS, Status, TXDATA};

/// Drive a running MMIO device server the way the bare-metal test firmware does
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Server port on 127.0.0.1
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Text to send through TXDATA
    #[arg(long, default_value = "Hello from MMIO sockdev\n")]
    message: String,

    /// STATUS polls per character before giving up on TXREADY
    #[arg(long, default_value_t = 1000)]
    max_polls: u32,
}

fn wait_tx_ready(client: &mut MmioClient, max_polls: u32) -> Result<()> {
    for _ in 0..max_polls {
        let status = Status::from_raw(client.read_u32(STATUS)? as u8);
        if status.txready() {
            return Ok(());
        }
    }
    bail!("TXREADY not set after {max_polls} polls")
}

fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut client = MmioClient::connect(("127.0.0.1", args.port))
        .with_context(|| format!("Failed to connect to MMIO device on port {}", args.port))?;

    client
        .write_u32(CTRL, Ctrl::enabled().raw().into())
        .context("Failed to enable device")?;

    for byte in args.message.bytes() {
        wait_tx_ready(&mut client, args.max_polls)?;
        client.write_u8(TXDATA, byte).context("Failed to write TXDATA")?;
    }

    let ctrl = Ctrl::from_raw(client.read_u32(CTRL)? as u8);
    log::info!(
        "Sent {} bytes, CTRL.ENABLE={}",
        args.message.len(),
        ctrl.enable()
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
