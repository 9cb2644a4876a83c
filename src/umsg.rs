//! User messages (umsgs): a doorbell area shared between the host and the AFU.
//!
//! The area holds one [`UMSG_SIZE`] slot per umsg the port supports. It is
//! set up lazily by [`Handle::umsg_ptr`] and torn down when the handle closes.

use std::os::unix::io::RawFd;
use std::ptr::{self, NonNull};

use tracing::{debug, warn};

use crate::buffer::UmsgBuffer;
use crate::ioctl::{self, PortIoctl};
use crate::{FpgaError, FpgaResult, Handle};

/// Size of a single umsg slot in bytes.
pub const UMSG_SIZE: usize = 4096;

/// The mapped umsg area of an open port.
#[derive(Debug)]
pub(crate) struct UmsgArea {
    buffer: UmsgBuffer,
    iova: u64,
    count: u64,
}

impl UmsgArea {
    fn slot(&self, n: u64) -> FpgaResult<NonNull<u64>> {
        if n >= self.count {
            return Err(FpgaError::invalid_param(format!(
                "umsg {n} out of range, the port has {} umsgs",
                self.count
            )));
        }
        let offset = (n as usize) * UMSG_SIZE / std::mem::size_of::<u64>();
        // SAFETY: n < count and the buffer spans count * UMSG_SIZE bytes.
        let ptr = unsafe { self.buffer.as_ptr().as_ptr().add(offset) };
        NonNull::new(ptr).ok_or_else(|| FpgaError::exception("null umsg slot"))
    }
}

impl Handle {
    /// Returns the number of umsgs the port supports.
    pub fn num_umsg(&self) -> FpgaResult<u64> {
        let state = self.lock()?;
        let info = ioctl::port_get_info(self.driver(), state.fd()?)?;
        Ok(u64::from(info.num_umsgs))
    }

    /// Sets the umsg hint bitmap; bit `n` turns on hint mode for umsg `n`.
    ///
    /// The driver only accepts hints for the umsgs it has, so any rejected
    /// request is reported as an invalid parameter.
    pub fn set_umsg_attributes(&self, value: u64) -> FpgaResult<()> {
        let hint_bitmap = u32::try_from(value).map_err(|_| {
            FpgaError::invalid_param(format!("umsg hint bitmap {value:#x} exceeds 32 bits"))
        })?;

        let state = self.lock()?;
        ioctl::port_umsg_set_mode(self.driver(), state.fd()?, hint_bitmap).map_err(|e| {
            debug!("failed to set umsg attributes of {}: {}", self.token(), e);
            FpgaError::invalid_param(format!("failed to set umsg hint bitmap {value:#x}"))
        })
    }

    /// Returns the start of the umsg area, setting it up on first use.
    ///
    /// The pointer stays valid until the handle is closed.
    pub fn umsg_ptr(&self) -> FpgaResult<NonNull<u64>> {
        self.with_umsg_area(|area| Ok(area.buffer.as_ptr()))
    }

    /// Returns the slot of umsg `n`.
    pub fn umsg_slot(&self, n: u64) -> FpgaResult<NonNull<u64>> {
        self.with_umsg_area(|area| area.slot(n))
    }

    /// Writes `value` to the first umsg slot, ringing the AFU's doorbell.
    pub fn trigger_umsg(&self, value: u64) -> FpgaResult<()> {
        self.with_umsg_area(|area| {
            let slot = area.slot(0)?;
            // SAFETY: the slot lies inside the live umsg mapping, which cannot be
            // released while the handle lock is held.
            unsafe { ptr::write_volatile(slot.as_ptr(), value) };
            Ok(())
        })
    }

    fn with_umsg_area<T, F>(&self, f: F) -> FpgaResult<T>
    where
        F: FnOnce(&UmsgArea) -> FpgaResult<T>,
    {
        let mut state = self.lock()?;
        let fd = state.fd()?;
        if state.umsg.is_none() {
            state.umsg = Some(setup(self.driver(), fd)?);
            debug!("umsg area of {} is ready", self.token());
        }
        match state.umsg.as_ref() {
            Some(area) => f(area),
            None => Err(FpgaError::exception("umsg area missing after setup")),
        }
    }
}

fn setup(driver: &dyn PortIoctl, fd: RawFd) -> FpgaResult<UmsgArea> {
    let count = u64::from(ioctl::port_get_info(driver, fd)?.num_umsgs);
    if count == 0 {
        return Err(FpgaError::not_supported("the port has no umsgs"));
    }
    let len = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(UMSG_SIZE))
        .ok_or_else(|| FpgaError::exception(format!("{count} umsgs do not fit in memory")))?;

    // The buffer is freed on drop if any of the steps below fail.
    let buffer = UmsgBuffer::allocate(len)?;
    let iova = ioctl::port_dma_map(driver, fd, buffer.user_addr(), buffer.len() as u64)?;

    if let Err(e) = ioctl::port_umsg_set_base_addr(driver, fd, iova) {
        unmap_quietly(driver, fd, iova);
        return Err(e);
    }
    if let Err(e) = ioctl::port_umsg_enable(driver, fd) {
        if let Err(reset) = ioctl::port_umsg_set_base_addr(driver, fd, 0) {
            warn!("failed to clear umsg base address: {reset}");
        }
        unmap_quietly(driver, fd, iova);
        return Err(e);
    }

    Ok(UmsgArea {
        buffer,
        iova,
        count,
    })
}

fn unmap_quietly(driver: &dyn PortIoctl, fd: RawFd, iova: u64) {
    if let Err(e) = ioctl::port_dma_unmap(driver, fd, iova) {
        warn!("failed to unmap umsg buffer at iova {iova:#x}: {e}");
    }
}

/// Disables umsgs and frees the area. Every step runs; the first error wins.
pub(crate) fn release(driver: &dyn PortIoctl, fd: RawFd, area: UmsgArea) -> FpgaResult<()> {
    let steps = [
        ioctl::port_umsg_disable(driver, fd),
        ioctl::port_umsg_set_base_addr(driver, fd, 0),
        ioctl::port_dma_unmap(driver, fd, area.iova),
    ];
    drop(area);

    let mut first = None;
    for res in steps {
        if let Err(e) = res {
            warn!("failed to release umsg area: {e}");
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}
