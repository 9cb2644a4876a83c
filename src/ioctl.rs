//! Port ioctls of the Intel FPGA kernel driver.
//!
//! Requests travel through the [`PortIoctl`] trait so that the driver side can
//! be replaced, e.g. by a fake in unit tests. [`SysIoctl`] forwards to the
//! kernel.

#![allow(non_camel_case_types)]

use std::fmt::Debug;
use std::io;
use std::mem::size_of;
use std::os::unix::io::RawFd;

use strum_macros::{Display, EnumIter};
use tracing::{debug, trace};

use crate::{FpgaError, FpgaResult};

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;
const IOC_NONE: u32 = 0;

pub const FPGA_MAGIC: u8 = 0xB6;
pub const PORT_BASE: u8 = 0x40;

/// The port reports error interrupts.
pub const FPGA_PORT_CAP_ERR_IRQ: u32 = 1 << 0;
/// The port reports user AFU interrupts.
pub const FPGA_PORT_CAP_UAFU_IRQ: u32 = 1 << 1;

const fn ioc(dir: u32, ty: u8, nr: u8, size: u32) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | (size << IOC_SIZESHIFT)
}

/// Equivalent of the `_IO` macro: a request carrying no size or direction.
pub const fn io(ty: u8, nr: u8) -> u32 {
    ioc(IOC_NONE, ty, nr, 0)
}

/// Requests understood by a port device file.
#[derive(Display, EnumIter, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PortRequest {
    #[strum(serialize = "FPGA_PORT_RESET")]
    Reset,
    #[strum(serialize = "FPGA_PORT_GET_INFO")]
    GetInfo,
    #[strum(serialize = "FPGA_PORT_DMA_MAP")]
    DmaMap,
    #[strum(serialize = "FPGA_PORT_DMA_UNMAP")]
    DmaUnmap,
    #[strum(serialize = "FPGA_PORT_UMSG_ENABLE")]
    UmsgEnable,
    #[strum(serialize = "FPGA_PORT_UMSG_DISABLE")]
    UmsgDisable,
    #[strum(serialize = "FPGA_PORT_UMSG_SET_MODE")]
    UmsgSetMode,
    #[strum(serialize = "FPGA_PORT_UMSG_SET_BASE_ADDR")]
    UmsgSetBaseAddr,
}

impl PortRequest {
    /// Returns the ioctl request number.
    pub const fn code(&self) -> u32 {
        use PortRequest::*;

        match self {
            Reset => io(FPGA_MAGIC, PORT_BASE),
            GetInfo => io(FPGA_MAGIC, PORT_BASE + 1),
            DmaMap => io(FPGA_MAGIC, PORT_BASE + 3),
            DmaUnmap => io(FPGA_MAGIC, PORT_BASE + 4),
            UmsgEnable => io(FPGA_MAGIC, PORT_BASE + 5),
            UmsgDisable => io(FPGA_MAGIC, PORT_BASE + 6),
            UmsgSetMode => io(FPGA_MAGIC, PORT_BASE + 7),
            UmsgSetBaseAddr => io(FPGA_MAGIC, PORT_BASE + 8),
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct fpga_port_info {
    pub argsz: u32,
    pub flags: u32,
    pub capability: u32,
    pub num_regions: u32,
    pub num_umsgs: u32,
    pub num_uafu_irqs: u32,
}

impl fpga_port_info {
    pub fn new() -> Self {
        Self {
            argsz: size_of::<Self>() as u32,
            ..Default::default()
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct fpga_port_umsg_cfg {
    pub argsz: u32,
    pub flags: u32,
    pub hint_bitmap: u32,
}

impl fpga_port_umsg_cfg {
    pub fn new(hint_bitmap: u32) -> Self {
        Self {
            argsz: size_of::<Self>() as u32,
            flags: 0,
            hint_bitmap,
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct fpga_port_umsg_base_addr {
    pub argsz: u32,
    pub flags: u32,
    pub iova: u64,
}

impl fpga_port_umsg_base_addr {
    pub fn new(iova: u64) -> Self {
        Self {
            argsz: size_of::<Self>() as u32,
            flags: 0,
            iova,
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct fpga_port_dma_map {
    pub argsz: u32,
    pub flags: u32,
    pub user_addr: u64,
    pub length: u64,
    /// Filled by the driver.
    pub iova: u64,
}

impl fpga_port_dma_map {
    pub fn new(user_addr: u64, length: u64) -> Self {
        Self {
            argsz: size_of::<Self>() as u32,
            flags: 0,
            user_addr,
            length,
            iova: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct fpga_port_dma_unmap {
    pub argsz: u32,
    pub flags: u32,
    pub iova: u64,
}

impl fpga_port_dma_unmap {
    pub fn new(iova: u64) -> Self {
        Self {
            argsz: size_of::<Self>() as u32,
            flags: 0,
            iova,
        }
    }
}

/// The argument passed along with a [`PortRequest`].
#[derive(Debug)]
pub enum IoctlArg<'a> {
    None,
    PortInfo(&'a mut fpga_port_info),
    UmsgCfg(&'a mut fpga_port_umsg_cfg),
    UmsgBaseAddr(&'a mut fpga_port_umsg_base_addr),
    DmaMap(&'a mut fpga_port_dma_map),
    DmaUnmap(&'a mut fpga_port_dma_unmap),
}

/// Issues port requests against an open port file descriptor.
pub trait PortIoctl: Send + Sync + Debug {
    fn ioctl(&self, fd: RawFd, request: PortRequest, arg: IoctlArg<'_>) -> io::Result<()>;
}

/// Forwards requests to the kernel driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysIoctl;

impl PortIoctl for SysIoctl {
    fn ioctl(&self, fd: RawFd, request: PortRequest, arg: IoctlArg<'_>) -> io::Result<()> {
        let code = request.code() as libc::Ioctl;
        // SAFETY: every argument is a `#[repr(C)]` struct borrowed mutably for the
        // duration of the call, laid out as the driver expects for `request`.
        let ret = unsafe {
            match arg {
                IoctlArg::None => libc::ioctl(fd, code),
                IoctlArg::PortInfo(p) => libc::ioctl(fd, code, p as *mut fpga_port_info),
                IoctlArg::UmsgCfg(p) => libc::ioctl(fd, code, p as *mut fpga_port_umsg_cfg),
                IoctlArg::UmsgBaseAddr(p) => {
                    libc::ioctl(fd, code, p as *mut fpga_port_umsg_base_addr)
                }
                IoctlArg::DmaMap(p) => libc::ioctl(fd, code, p as *mut fpga_port_dma_map),
                IoctlArg::DmaUnmap(p) => libc::ioctl(fd, code, p as *mut fpga_port_dma_unmap),
            }
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

fn call(
    driver: &dyn PortIoctl,
    fd: RawFd,
    request: PortRequest,
    arg: IoctlArg<'_>,
) -> FpgaResult<()> {
    trace!("{request} on fd {fd}");
    driver.ioctl(fd, request, arg).map_err(|e| {
        debug!("{request} failed on fd {fd}: {e}");
        FpgaError::from_ioctl(request, e)
    })
}

pub(crate) fn port_reset(driver: &dyn PortIoctl, fd: RawFd) -> FpgaResult<()> {
    call(driver, fd, PortRequest::Reset, IoctlArg::None)
}

pub(crate) fn port_get_info(driver: &dyn PortIoctl, fd: RawFd) -> FpgaResult<fpga_port_info> {
    let mut info = fpga_port_info::new();
    call(driver, fd, PortRequest::GetInfo, IoctlArg::PortInfo(&mut info))?;
    Ok(info)
}

pub(crate) fn port_umsg_set_mode(
    driver: &dyn PortIoctl,
    fd: RawFd,
    hint_bitmap: u32,
) -> FpgaResult<()> {
    let mut cfg = fpga_port_umsg_cfg::new(hint_bitmap);
    call(driver, fd, PortRequest::UmsgSetMode, IoctlArg::UmsgCfg(&mut cfg))
}

pub(crate) fn port_umsg_set_base_addr(
    driver: &dyn PortIoctl,
    fd: RawFd,
    iova: u64,
) -> FpgaResult<()> {
    let mut base = fpga_port_umsg_base_addr::new(iova);
    call(
        driver,
        fd,
        PortRequest::UmsgSetBaseAddr,
        IoctlArg::UmsgBaseAddr(&mut base),
    )
}

pub(crate) fn port_umsg_enable(driver: &dyn PortIoctl, fd: RawFd) -> FpgaResult<()> {
    call(driver, fd, PortRequest::UmsgEnable, IoctlArg::None)
}

pub(crate) fn port_umsg_disable(driver: &dyn PortIoctl, fd: RawFd) -> FpgaResult<()> {
    call(driver, fd, PortRequest::UmsgDisable, IoctlArg::None)
}

/// Maps `length` bytes at `user_addr` for device access and returns the IOVA.
pub(crate) fn port_dma_map(
    driver: &dyn PortIoctl,
    fd: RawFd,
    user_addr: u64,
    length: u64,
) -> FpgaResult<u64> {
    let mut map = fpga_port_dma_map::new(user_addr, length);
    call(driver, fd, PortRequest::DmaMap, IoctlArg::DmaMap(&mut map))?;
    Ok(map.iova)
}

pub(crate) fn port_dma_unmap(driver: &dyn PortIoctl, fd: RawFd, iova: u64) -> FpgaResult<()> {
    let mut unmap = fpga_port_dma_unmap::new(iova);
    call(driver, fd, PortRequest::DmaUnmap, IoctlArg::DmaUnmap(&mut unmap))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;
    use crate::testing::FakeIoctl;
    use crate::ResultCode;

    #[test]
    fn test_request_codes() {
        assert_eq!(io(FPGA_MAGIC, PORT_BASE + 1), 0xB641);
        assert_eq!(PortRequest::DmaMap.code(), 0xB643);
        assert_eq!(PortRequest::Reset.code(), 0xB640);
        assert_eq!(PortRequest::GetInfo.code(), 0xB641);
        assert_eq!(PortRequest::UmsgSetMode.code(), 0xB647);
        assert_eq!(PortRequest::UmsgSetBaseAddr.code(), 0xB648);

        let codes: HashSet<u32> = PortRequest::iter().map(|r| r.code()).collect();
        assert_eq!(codes.len(), PortRequest::iter().count());
    }

    #[test]
    fn test_request_names() {
        assert_eq!(PortRequest::GetInfo.to_string(), "FPGA_PORT_GET_INFO");
        assert_eq!(
            PortRequest::UmsgSetMode.to_string(),
            "FPGA_PORT_UMSG_SET_MODE"
        );
    }

    #[test]
    fn test_argsz() {
        assert_eq!(fpga_port_info::new().argsz, 24);
        assert_eq!(fpga_port_umsg_cfg::new(0).argsz, 12);
        assert_eq!(fpga_port_umsg_base_addr::new(0).argsz, 16);
        assert_eq!(fpga_port_dma_map::new(0, 0).argsz, 32);
        assert_eq!(fpga_port_dma_unmap::new(0).argsz, 16);
    }

    #[test]
    fn test_sys_ioctl_failure() -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        // a regular file answers every request with -1 and ENOTTY
        let file = std::fs::File::open("test_data/test-0/dev/intel-fpga-port.0")?;
        let err = SysIoctl
            .ioctl(file.as_raw_fd(), PortRequest::Reset, IoctlArg::None)
            .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));

        let res = port_get_info(&SysIoctl, file.as_raw_fd());
        assert_eq!(ResultCode::of(&res), ResultCode::Exception);
        Ok(())
    }

    #[test]
    fn test_typed_helpers() -> FpgaResult<()> {
        let fake = FakeIoctl::new();

        let info = port_get_info(&fake, 3)?;
        assert_eq!(info.num_umsgs, 8);
        assert_eq!(info.num_regions, 1);

        port_umsg_set_mode(&fake, 3, 0)?;
        let iova = port_dma_map(&fake, 3, 0x1000, 0x8000)?;
        port_umsg_set_base_addr(&fake, 3, iova)?;
        port_dma_unmap(&fake, 3, iova)?;

        assert_eq!(
            fake.requests(),
            vec![
                PortRequest::GetInfo,
                PortRequest::UmsgSetMode,
                PortRequest::DmaMap,
                PortRequest::UmsgSetBaseAddr,
                PortRequest::DmaUnmap,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_typed_helpers_map_errno() {
        let fake = FakeIoctl::new();

        fake.fail(PortRequest::GetInfo, libc::EFAULT);
        let res = port_get_info(&fake, 3);
        assert_eq!(ResultCode::of(&res), ResultCode::InvalidParam);

        fake.fail(PortRequest::GetInfo, libc::EBUSY);
        let res = port_get_info(&fake, 3);
        assert_eq!(ResultCode::of(&res), ResultCode::Exception);

        fake.fail(PortRequest::UmsgSetMode, libc::EINVAL);
        let res = port_umsg_set_mode(&fake, 3, 0);
        assert_eq!(ResultCode::of(&res), ResultCode::InvalidParam);
    }
}
