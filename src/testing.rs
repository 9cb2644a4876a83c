//! A fake port driver for unit tests.
//!
//! It answers port requests the way the kernel driver does for a port with
//! eight umsgs, and lets a test force any request to fail with an errno.

use std::collections::HashMap;
use std::io;
use std::mem::size_of;
use std::os::unix::io::RawFd;
use std::sync::Mutex;

use crate::ioctl::{
    fpga_port_dma_map, fpga_port_dma_unmap, fpga_port_info, fpga_port_umsg_base_addr,
    fpga_port_umsg_cfg, IoctlArg, PortIoctl, PortRequest,
};
use crate::token::{ObjectType, Token};

const IOVA_BASE: u64 = 0x1_0000_0000;

/// Token of `intel-fpga-port.0` in the `test-0` fixture; its device file is a
/// regular file, so opening it works without the driver.
pub(crate) fn fake_port_token() -> Token {
    Token::new(
        ObjectType::Accelerator,
        0,
        "test_data/test-0/dev/intel-fpga-port.0".into(),
        "test_data/test-0/sys/class/fpga/intel-fpga-dev.0/intel-fpga-port.0".into(),
        Some("d8424dc4a4a3c413f89e433683f9040b".into()),
        Some((246, 0)),
    )
}

#[derive(Debug)]
struct FakeState {
    failures: HashMap<PortRequest, i32>,
    requests: Vec<PortRequest>,
    num_umsgs: u32,
    capability: u32,
    next_iova: u64,
    mapped: HashMap<u64, u64>,
    base_addr: u64,
    hint_bitmap: u32,
    umsg_enabled: bool,
}

#[derive(Debug)]
pub(crate) struct FakeIoctl {
    state: Mutex<FakeState>,
}

impl FakeIoctl {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                failures: HashMap::new(),
                requests: vec![],
                num_umsgs: 8,
                capability: 0,
                next_iova: IOVA_BASE,
                mapped: HashMap::new(),
                base_addr: 0,
                hint_bitmap: 0,
                umsg_enabled: false,
            }),
        }
    }

    /// Makes every following `request` fail with `errno`.
    pub fn fail(&self, request: PortRequest, errno: i32) {
        self.state.lock().unwrap().failures.insert(request, errno);
    }

    /// Undoes [`fail`][FakeIoctl::fail].
    pub fn restore(&self, request: PortRequest) {
        self.state.lock().unwrap().failures.remove(&request);
    }

    pub fn set_num_umsgs(&self, num_umsgs: u32) {
        self.state.lock().unwrap().num_umsgs = num_umsgs;
    }

    pub fn set_capability(&self, capability: u32) {
        self.state.lock().unwrap().capability = capability;
    }

    /// Requests received so far, failed ones included.
    pub fn requests(&self) -> Vec<PortRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, request: PortRequest) -> usize {
        self.requests().into_iter().filter(|r| *r == request).count()
    }

    pub fn umsg_enabled(&self) -> bool {
        self.state.lock().unwrap().umsg_enabled
    }

    pub fn base_addr(&self) -> u64 {
        self.state.lock().unwrap().base_addr
    }

    pub fn hint_bitmap(&self) -> u32 {
        self.state.lock().unwrap().hint_bitmap
    }

    /// Number of live DMA mappings.
    pub fn mappings(&self) -> usize {
        self.state.lock().unwrap().mapped.len()
    }
}

fn einval() -> io::Error {
    io::Error::from_raw_os_error(libc::EINVAL)
}

fn check_header(argsz: u32, flags: u32, expected: usize) -> io::Result<()> {
    if argsz as usize != expected || flags != 0 {
        return Err(einval());
    }
    Ok(())
}

impl PortIoctl for FakeIoctl {
    fn ioctl(&self, fd: RawFd, request: PortRequest, arg: IoctlArg<'_>) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);

        if fd < 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        if let Some(errno) = state.failures.get(&request) {
            return Err(io::Error::from_raw_os_error(*errno));
        }

        match (request, arg) {
            (PortRequest::GetInfo, IoctlArg::PortInfo(info)) => {
                if info.argsz as usize != size_of::<fpga_port_info>() {
                    return Err(einval());
                }
                info.flags = 0;
                info.capability = state.capability;
                info.num_regions = 1;
                info.num_umsgs = state.num_umsgs;
                info.num_uafu_irqs = u32::from(state.capability != 0);
                Ok(())
            }
            (PortRequest::UmsgSetMode, IoctlArg::UmsgCfg(cfg)) => {
                check_header(cfg.argsz, cfg.flags, size_of::<fpga_port_umsg_cfg>())?;
                if cfg.hint_bitmap >> 8 != 0 {
                    return Err(einval());
                }
                state.hint_bitmap = cfg.hint_bitmap;
                Ok(())
            }
            (PortRequest::UmsgSetBaseAddr, IoctlArg::UmsgBaseAddr(base)) => {
                check_header(base.argsz, base.flags, size_of::<fpga_port_umsg_base_addr>())?;
                if base.iova != 0 && !state.mapped.contains_key(&base.iova) {
                    return Err(einval());
                }
                state.base_addr = base.iova;
                Ok(())
            }
            (PortRequest::DmaMap, IoctlArg::DmaMap(map)) => {
                check_header(map.argsz, map.flags, size_of::<fpga_port_dma_map>())?;
                if map.user_addr == 0 || map.length == 0 {
                    return Err(einval());
                }
                map.iova = state.next_iova;
                state.next_iova += map.length;
                let (iova, length) = (map.iova, map.length);
                state.mapped.insert(iova, length);
                Ok(())
            }
            (PortRequest::DmaUnmap, IoctlArg::DmaUnmap(unmap)) => {
                check_header(unmap.argsz, unmap.flags, size_of::<fpga_port_dma_unmap>())?;
                state.mapped.remove(&unmap.iova).map(|_| ()).ok_or_else(einval)
            }
            (PortRequest::UmsgEnable, IoctlArg::None) => {
                if state.base_addr == 0 {
                    return Err(einval());
                }
                state.umsg_enabled = true;
                Ok(())
            }
            (PortRequest::UmsgDisable, IoctlArg::None) => {
                state.umsg_enabled = false;
                Ok(())
            }
            (PortRequest::Reset, IoctlArg::None) => Ok(()),
            _ => Err(io::Error::from_raw_os_error(libc::ENOTTY)),
        }
    }
}
