use cli_table::{print_stdout, Cell, Style, Table};
use itertools::join;

use fpga_port::blocking::enumerate;
use fpga_port::{Filter, FpgaError, Token};

fn main() -> Result<(), FpgaError> {
    tracing_subscriber::fmt::init();

    let found: Vec<Token> = enumerate(&Filter::any())?;
    for token in found.iter() {
        println!("{:?}", token);
    }

    let mut rows = vec![];
    for token in found.iter() {
        let dev = token
            .dev_num()
            .map(|(major, minor)| join([major, minor], ":"))
            .unwrap_or_default();
        rows.push(vec![
            token.to_string().cell(),
            token.object_type().cell(),
            dev.cell(),
        ]);
    }
    let table = rows.table().title(vec![
        "Name".cell().bold(true),
        "Type".cell().bold(true),
        "Dev".cell().bold(true),
    ]);
    print_stdout(table)?;

    Ok(())
}
