use std::fmt::{self, Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::ioctl::{self, PortIoctl, SysIoctl, FPGA_PORT_CAP_ERR_IRQ, FPGA_PORT_CAP_UAFU_IRQ};
use crate::umsg::{self, UmsgArea};
use crate::{FpgaError, FpgaResult, Token};

bitflags::bitflags! {
    /// Flags for [`Handle::open`].
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct OpenFlags: u32 {
        /// Allow other processes to open the same port.
        const SHARED = 1 << 0;
    }
}

impl OpenFlags {
    /// Exclusive access; opening a port that is already open fails with `Busy`.
    pub const EXCLUSIVE: OpenFlags = OpenFlags::empty();
}

/// Port properties reported by the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PortInfo {
    pub flags: u32,
    pub capability: u32,
    pub num_regions: u32,
    pub num_umsgs: u32,
    pub num_uafu_irqs: u32,
}

impl PortInfo {
    pub fn has_err_irq(&self) -> bool {
        self.capability & FPGA_PORT_CAP_ERR_IRQ != 0
    }

    pub fn has_uafu_irq(&self) -> bool {
        self.capability & FPGA_PORT_CAP_UAFU_IRQ != 0
    }
}

impl From<ioctl::fpga_port_info> for PortInfo {
    fn from(info: ioctl::fpga_port_info) -> Self {
        Self {
            flags: info.flags,
            capability: info.capability,
            num_regions: info.num_regions,
            num_umsgs: info.num_umsgs,
            num_uafu_irqs: info.num_uafu_irqs,
        }
    }
}

#[derive(Debug)]
pub(crate) struct HandleState {
    file: Option<File>,
    pub(crate) umsg: Option<UmsgArea>,
}

impl HandleState {
    pub(crate) fn fd(&self) -> FpgaResult<RawFd> {
        self.file
            .as_ref()
            .map(|f| f.as_raw_fd())
            .ok_or_else(|| FpgaError::invalid_param("invalid handle file descriptor"))
    }
}

/// An open accelerator port.
///
/// All operations take `&self`; the port state is guarded by a lock so a handle
/// can be shared between threads. The port is closed on drop, or explicitly
/// with [`close`][Handle::close] to observe cleanup errors.
pub struct Handle {
    token: Token,
    driver: Arc<dyn PortIoctl>,
    state: Mutex<HandleState>,
}

impl Handle {
    /// Opens the port behind `token`.
    pub fn open(token: &Token, flags: OpenFlags) -> FpgaResult<Handle> {
        Self::open_with(token, flags, Arc::new(SysIoctl))
    }

    /// Opens the port behind `token`, sending port requests to `driver`.
    pub fn open_with(
        token: &Token,
        flags: OpenFlags,
        driver: Arc<dyn PortIoctl>,
    ) -> FpgaResult<Handle> {
        if !token.is_accelerator() {
            return Err(FpgaError::invalid_param(format!(
                "{token} is not an accelerator port"
            )));
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if !flags.contains(OpenFlags::SHARED) {
            options.custom_flags(libc::O_EXCL);
        }

        let file = options
            .open(token.dev_path())
            .map_err(|e| open_error(token, e))?;
        debug!("opened {} as fd {}", token, file.as_raw_fd());

        Ok(Handle {
            token: token.clone(),
            driver,
            state: Mutex::new(HandleState {
                file: Some(file),
                umsg: None,
            }),
        })
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn is_open(&self) -> bool {
        self.lock().map(|s| s.file.is_some()).unwrap_or(false)
    }

    /// Releases the umsg area, if any, and closes the port file.
    ///
    /// The port file is closed even if releasing the umsg area failed; the
    /// first release error is returned.
    pub fn close(&self) -> FpgaResult<()> {
        let mut state = self.lock()?;
        close_state(&self.token, self.driver.as_ref(), &mut state)
    }

    /// Resets the accelerator behind the port.
    pub fn reset(&self) -> FpgaResult<()> {
        let state = self.lock()?;
        ioctl::port_reset(self.driver.as_ref(), state.fd()?)
    }

    pub fn port_info(&self) -> FpgaResult<PortInfo> {
        let state = self.lock()?;
        ioctl::port_get_info(self.driver.as_ref(), state.fd()?).map(PortInfo::from)
    }

    pub(crate) fn driver(&self) -> &dyn PortIoctl {
        self.driver.as_ref()
    }

    pub(crate) fn lock(&self) -> FpgaResult<MutexGuard<'_, HandleState>> {
        self.state
            .lock()
            .map_err(|_| FpgaError::exception(format!("{} state lock poisoned", self.token)))
    }
}

fn open_error(token: &Token, e: io::Error) -> FpgaError {
    match e.raw_os_error() {
        Some(libc::EBUSY) => FpgaError::busy(token),
        _ if e.kind() == io::ErrorKind::NotFound => FpgaError::not_found(token),
        _ => FpgaError::from(e),
    }
}

fn close_state(token: &Token, driver: &dyn PortIoctl, state: &mut HandleState) -> FpgaResult<()> {
    let fd = state.fd()?;
    let res = match state.umsg.take() {
        Some(area) => umsg::release(driver, fd, area),
        None => Ok(()),
    };
    state.file = None;
    debug!("closed {}", token);
    res
}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("token", &self.token)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        // the umsg area is released even if the lock was poisoned
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if state.file.is_some() {
            if let Err(e) = close_state(&self.token, self.driver.as_ref(), state) {
                warn!("failed to close {}: {}", self.token, e);
            }
        }
    }
}
