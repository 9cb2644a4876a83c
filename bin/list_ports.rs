use cli_table::{print_stdout, Cell, Style, Table};
use fpga_port::{list_ports, FpgaError, Handle, OpenFlags};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), FpgaError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut rows = vec![];
    for port in list_ports().await? {
        let afu_id = port.afu_id().unwrap_or("-").to_string();
        let dev = port
            .dev_num()
            .map(|(major, minor)| format!("{major}:{minor}"))
            .unwrap_or_else(|| "-".to_string());
        let umsgs = match Handle::open(&port, OpenFlags::SHARED).and_then(|h| h.num_umsg()) {
            Ok(n) => n.to_string(),
            Err(e) => {
                tracing::debug!("cannot query {port}: {e}");
                "-".to_string()
            }
        };
        rows.push(vec![
            port.to_string().cell(),
            afu_id.cell(),
            dev.cell(),
            umsgs.cell(),
        ]);
    }

    let table = rows.table().title(vec![
        "Port".cell().bold(true),
        "AFU".cell().bold(true),
        "Dev".cell().bold(true),
        "Umsgs".cell().bold(true),
    ]);
    print_stdout(table)?;

    Ok(())
}
