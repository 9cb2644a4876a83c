//! A set of APIs to discover FPGA accelerator ports and drive their user
//! messages (umsgs) through the Intel FPGA port driver.
//!
//! # Before you start
//!
//! This crate talks to the `intel-fpga-port.N` device files created by the
//! kernel driver. Without the driver, listing returns nothing and opening fails.
//!
//! # Usage
//!
//! Add this to your 'Cargo.toml':
//! ```toml
//! [dependencies]
//! fpga-port = "0.1"
//! ```
//!
//! ## Listing ports
//!
//! [`list_ports`] enumerates every accelerator port in the system, while
//! [`enumerate`] narrows the result down with a [`Filter`].
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> eyre::Result<()> {
//! let ports = fpga_port::list_ports().await?;
//! let port0 = fpga_port::enumerate(&fpga_port::Filter::accelerator().index(0)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Ringing a umsg
//!
//! Open a port [`Handle`] from a [`Token`], then write to its umsg area.
//! The area is mapped and registered with the driver on first use, and
//! released when the handle is closed or dropped.
//! ```rust,no_run
//! use fpga_port::{Handle, OpenFlags};
//!
//! # #[tokio::main]
//! # async fn main() -> eyre::Result<()> {
//! let token = fpga_port::get_port(0).await?;
//! let handle = Handle::open(&token, OpenFlags::SHARED)?;
//! println!("{} umsgs", handle.num_umsg()?);
//! handle.set_umsg_attributes(0)?;
//! handle.trigger_umsg(0xcafe)?;
//! handle.close()?;
//! # Ok(())
//! # }
//! ```

// Allows displaying feature flags in the documentation.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use crate::error::{FpgaError, FpgaResult, ResultCode};
pub use crate::handle::{Handle, OpenFlags, PortInfo};
pub use crate::token::{Filter, ObjectType, Token};
pub use crate::umsg::UMSG_SIZE;
use crate::list::{enumerate_with, get_port_by_name_with, get_port_with, list_ports_with};

#[cfg(feature = "blocking")]
#[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
pub mod blocking;
mod buffer;
mod devfs;
pub mod env;
mod error;
mod handle;
pub mod ioctl;
mod list;
mod sysfs;
#[cfg(test)]
mod testing;
mod token;
mod umsg;

/// List all accelerator ports in the system.
///
/// See the [crate-level documentation](crate).
pub async fn list_ports() -> FpgaResult<Vec<Token>> {
    list_ports_with(&env::get_dev_fs("/dev"), &env::get_sys_fs("/sys")).await
}

/// Return the FPGA objects matching `filter`, ordered by index.
pub async fn enumerate(filter: &Filter) -> FpgaResult<Vec<Token>> {
    enumerate_with(filter, &env::get_dev_fs("/dev"), &env::get_sys_fs("/sys")).await
}

/// Return a specific accelerator port in the system.
///
/// # Arguments
///
/// * `idx` - An index number of the port (e.g., 0, 1)
pub async fn get_port(idx: u8) -> FpgaResult<Token> {
    get_port_with(idx, &env::get_dev_fs("/dev"), &env::get_sys_fs("/sys")).await
}

/// Return a port by its device file name.
///
/// # Arguments
///
/// * `name` - A device file name (e.g., intel-fpga-port.0)
pub async fn get_port_by_name<S: AsRef<str>>(name: S) -> FpgaResult<Token> {
    get_port_by_name_with(
        name.as_ref(),
        &env::get_dev_fs("/dev"),
        &env::get_sys_fs("/sys"),
    )
    .await
}
