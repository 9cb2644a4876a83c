use std::io;
use std::ptr::{self, NonNull};

use crate::{FpgaError, FpgaResult};

/// A page-aligned, zero-filled anonymous mapping, unmapped on drop.
#[derive(Debug)]
pub(crate) struct UmsgBuffer {
    ptr: NonNull<u64>,
    len: usize,
}

// SAFETY: the mapping is owned exclusively by this value and accessed only
// through raw pointers handed out under the port handle's lock.
unsafe impl Send for UmsgBuffer {}

pub(crate) fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

impl UmsgBuffer {
    pub fn allocate(len: usize) -> FpgaResult<Self> {
        if len == 0 {
            return Err(FpgaError::invalid_param("buffer length must not be zero"));
        }
        let page = page_size();
        let len = len
            .checked_add(page - 1)
            .map(|l| l & !(page - 1))
            .ok_or_else(|| FpgaError::invalid_param(format!("buffer length {len} overflows")))?;

        // SAFETY: anonymous private mapping with no fixed address; the result is
        // checked against MAP_FAILED before use.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            let cause = io::Error::last_os_error();
            return Err(match cause.raw_os_error() {
                Some(libc::ENOMEM) => FpgaError::NoMemory { cause },
                _ => FpgaError::from(cause),
            });
        }

        let ptr = NonNull::new(addr.cast::<u64>())
            .ok_or_else(|| FpgaError::exception("mmap returned a null mapping"))?;
        Ok(Self { ptr, len })
    }

    pub fn as_ptr(&self) -> NonNull<u64> {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Virtual address as passed to the driver's DMA mapping request.
    pub fn user_addr(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }
}

impl Drop for UmsgBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr and len describe exactly the mapping created in `allocate`.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_rounds_to_page() -> FpgaResult<()> {
        let page = page_size();
        let buf = UmsgBuffer::allocate(1)?;
        assert_eq!(buf.len(), page);
        assert_eq!(buf.user_addr() % page as u64, 0);

        let buf = UmsgBuffer::allocate(page * 8)?;
        assert_eq!(buf.len(), page * 8);
        Ok(())
    }

    #[test]
    fn test_allocate_zeroed_and_writable() -> FpgaResult<()> {
        let buf = UmsgBuffer::allocate(page_size())?;
        let words = buf.len() / std::mem::size_of::<u64>();
        let slice = unsafe { std::slice::from_raw_parts_mut(buf.as_ptr().as_ptr(), words) };
        assert!(slice.iter().all(|w| *w == 0));
        slice[0] = 0xdead_beef;
        assert_eq!(unsafe { *buf.as_ptr().as_ptr() }, 0xdead_beef);
        Ok(())
    }

    #[test]
    fn test_allocate_out_of_memory() {
        // 256 TiB exceeds the user address space, so mmap fails with ENOMEM
        let res = UmsgBuffer::allocate(1 << 48);
        assert!(matches!(res, Err(FpgaError::NoMemory { .. })));
        assert_eq!(crate::ResultCode::of(&res), crate::ResultCode::NoMemory);
    }

    #[test]
    fn test_allocate_zero_length() {
        assert!(UmsgBuffer::allocate(0).is_err());
    }
}
