//! Rings umsg 0 of the selected ports with the value given on the command line.
//!
//! Usage: `FPGA_PORT=accelerator:0 trigger_umsg 0x1234 [hint_bitmap]`

use eyre::{eyre, WrapErr};
use fpga_port::{env, enumerate, Handle, OpenFlags, Token};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_u64(text: &str) -> eyre::Result<u64> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.wrap_err_with(|| format!("invalid number {text}"))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let value = args
        .first()
        .ok_or_else(|| eyre!("usage: trigger_umsg <value> [hint_bitmap]"))
        .and_then(|v| parse_u64(v))?;
    let hints = args.get(1).map(|h| parse_u64(h)).transpose()?;

    let selection = env::get_port_filter()?;
    let ports: Vec<Token> = enumerate(&selection)
        .await?
        .into_iter()
        .filter(|p| p.is_accelerator())
        .collect();
    if ports.is_empty() {
        return Err(eyre!("no accelerator port matches {selection}"));
    }

    for port in ports.iter() {
        let handle = Handle::open(port, OpenFlags::SHARED)?;
        if let Some(hints) = hints {
            handle.set_umsg_attributes(hints)?;
        }
        handle.trigger_umsg(value)?;
        info!("{port}: umsg 0 <- {value:#x}, {} umsgs", handle.num_umsg()?);
        handle.close()?;
    }

    Ok(())
}
