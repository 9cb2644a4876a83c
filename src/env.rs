use std::env;

use crate::{Filter, FpgaResult};

pub const DEV_FS_ENV: &str = "FPGA_DEV_FS";
pub const SYS_FS_ENV: &str = "FPGA_SYS_FS";
pub const PORT_ENV: &str = "FPGA_PORT";

/// Parse and return dev fs path defined in the FPGA_DEV_FS env var.
/// Return the default dev fs path, if the env var is not set.
pub fn get_dev_fs(default: &str) -> String {
    match env::var(DEV_FS_ENV) {
        Ok(str) => str,
        _ => default.to_string(),
    }
}

/// Parse and return sys fs path defined in the FPGA_SYS_FS env var.
/// Return the default sys fs path, if the env var is not set.
pub fn get_sys_fs(default: &str) -> String {
    match env::var(SYS_FS_ENV) {
        Ok(str) => str,
        _ => default.to_string(),
    }
}

/// Parse the port selection in the FPGA_PORT env var (e.g., `accelerator:0`).
/// The selection always narrows to accelerator ports; naming `device` is an error.
/// Falls back to every accelerator port if the env var is not set.
pub fn get_port_filter() -> FpgaResult<Filter> {
    match env::var(PORT_ENV) {
        Ok(text) => text.parse::<Filter>()?.ports_only(),
        _ => Ok(Filter::accelerator()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share process-wide variables, so they run in one test.
    #[test]
    fn test_env_vars() -> FpgaResult<()> {
        env::remove_var(DEV_FS_ENV);
        env::remove_var(SYS_FS_ENV);
        env::remove_var(PORT_ENV);
        assert_eq!(get_dev_fs("/dev").as_str(), "/dev");
        assert_eq!(get_sys_fs("/sys").as_str(), "/sys");
        assert_eq!(get_port_filter()?, Filter::accelerator());

        env::set_var(DEV_FS_ENV, "/test/dev");
        env::set_var(SYS_FS_ENV, "/test/sys");
        env::set_var(PORT_ENV, "accelerator:1");
        assert_eq!(get_dev_fs("/dev").as_str(), "/test/dev");
        assert_eq!(get_sys_fs("/sys").as_str(), "/test/sys");
        assert_eq!(get_port_filter()?, Filter::accelerator().index(1));

        env::set_var(PORT_ENV, "1");
        assert_eq!(get_port_filter()?, Filter::accelerator().index(1));

        env::set_var(PORT_ENV, "device");
        assert!(get_port_filter().is_err());

        env::set_var(PORT_ENV, "port-1");
        assert!(get_port_filter().is_err());

        env::remove_var(DEV_FS_ENV);
        env::remove_var(SYS_FS_ENV);
        env::remove_var(PORT_ENV);
        Ok(())
    }
}
