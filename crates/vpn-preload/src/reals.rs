//! Original entry points.
//!
//! The C runtime image is opened once, the six socket primitives are looked up
//! by name and the handle is closed again; the resolved addresses stay valid
//! for the life of the process because libc is never unloaded.

use libc::{c_char, c_int, c_void, size_t, sockaddr, socklen_t, ssize_t};
use std::ffi::CStr;

use vpn_config::DEFAULT_MIN_OFFSET;

use crate::error::InitError;

/// Tried in order until one opens
const RUNTIME_IMAGES: &[&CStr] = &[
    c"/lib/libc.so",
    c"/lib/libc.so.6",
    c"libc.so.6",
    c"/lib64/libc.so.6",
    c"/usr/lib/libc.so.6",
];

type CloseFn = unsafe extern "C" fn(c_int) -> c_int;
type ConnectFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;
type ReadFn = unsafe extern "C" fn(c_int, *mut c_void, size_t) -> ssize_t;
type RecvFn = unsafe extern "C" fn(c_int, *mut c_void, size_t, c_int) -> ssize_t;
type SendFn = unsafe extern "C" fn(c_int, *const c_void, size_t, c_int) -> ssize_t;
type WriteFn = unsafe extern "C" fn(c_int, *const c_void, size_t) -> ssize_t;

/// The unshadowed socket primitives the dispatcher falls back to
pub trait NativeSockets: Send + Sync {
    unsafe fn close(&self, fd: c_int) -> c_int;
    unsafe fn connect(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int;
    unsafe fn read(&self, fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t;
    unsafe fn recv(&self, fd: c_int, buf: *mut c_void, count: size_t, flags: c_int) -> ssize_t;
    unsafe fn send(&self, fd: c_int, buf: *const c_void, count: size_t, flags: c_int) -> ssize_t;
    unsafe fn write(&self, fd: c_int, buf: *const c_void, count: size_t) -> ssize_t;
}

/// Entry points resolved from the C runtime image
pub struct LibcSockets {
    close: CloseFn,
    connect: ConnectFn,
    read: ReadFn,
    recv: RecvFn,
    send: SendFn,
    write: WriteFn,
}

/// dlopen handle, closed on drop
struct RuntimeImage(*mut c_void);

impl RuntimeImage {
    fn open() -> Result<Self, InitError> {
        for path in RUNTIME_IMAGES {
            let handle = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_LAZY) };
            if !handle.is_null() {
                return Ok(Self(handle));
            }
        }
        Err(InitError::NoRuntimeImage(last_dl_error()))
    }

    fn symbol(&self, name: &'static CStr) -> Result<*mut c_void, InitError> {
        let sym = unsafe { libc::dlsym(self.0, name.as_ptr()) };
        if sym.is_null() {
            Err(InitError::MissingSymbol(name.to_str().unwrap_or("?")))
        } else {
            Ok(sym)
        }
    }
}

impl Drop for RuntimeImage {
    fn drop(&mut self) {
        unsafe { libc::dlclose(self.0) };
    }
}

fn last_dl_error() -> String {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown error".to_string()
    } else {
        unsafe { CStr::from_ptr(err as *const c_char) }
            .to_string_lossy()
            .into_owned()
    }
}

impl LibcSockets {
    /// Resolve all six primitives; any miss is fatal to the caller
    pub fn resolve() -> Result<Self, InitError> {
        let image = RuntimeImage::open()?;
        unsafe {
            Ok(Self {
                close: std::mem::transmute::<*mut c_void, CloseFn>(image.symbol(c"close")?),
                connect: std::mem::transmute::<*mut c_void, ConnectFn>(image.symbol(c"connect")?),
                read: std::mem::transmute::<*mut c_void, ReadFn>(image.symbol(c"read")?),
                recv: std::mem::transmute::<*mut c_void, RecvFn>(image.symbol(c"recv")?),
                send: std::mem::transmute::<*mut c_void, SendFn>(image.symbol(c"send")?),
                write: std::mem::transmute::<*mut c_void, WriteFn>(image.symbol(c"write")?),
            })
        }
    }
}

impl NativeSockets for LibcSockets {
    unsafe fn close(&self, fd: c_int) -> c_int {
        (self.close)(fd)
    }

    unsafe fn connect(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
        (self.connect)(fd, addr, len)
    }

    unsafe fn read(&self, fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
        (self.read)(fd, buf, count)
    }

    unsafe fn recv(&self, fd: c_int, buf: *mut c_void, count: size_t, flags: c_int) -> ssize_t {
        (self.recv)(fd, buf, count, flags)
    }

    unsafe fn send(&self, fd: c_int, buf: *const c_void, count: size_t, flags: c_int) -> ssize_t {
        (self.send)(fd, buf, count, flags)
    }

    unsafe fn write(&self, fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
        (self.write)(fd, buf, count)
    }
}

/// Hard open-files limit, `None` when it cannot be read
pub fn hard_nofile_limit() -> Option<libc::rlim_t> {
    let mut rl = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rl) } == 0 {
        Some(rl.rlim_max)
    } else {
        None
    }
}

/// First virtual descriptor for this process.
///
/// Kernel descriptors stay below the open-files hard limit, so starting at
/// that limit keeps the two namespaces disjoint. `min_offset` never lowers
/// the floor below [`DEFAULT_MIN_OFFSET`]; unavailable, unbounded or
/// overflowing limits fall back to the floor.
pub fn offset_from_limit(min_offset: i32, hard_limit: Option<libc::rlim_t>) -> i32 {
    let floor = min_offset.max(DEFAULT_MIN_OFFSET);
    match hard_limit {
        Some(max) if max != libc::RLIM_INFINITY => match i32::try_from(max) {
            Ok(max) => max.max(floor),
            Err(_) => floor,
        },
        _ => floor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_uses_larger_hard_limit() {
        assert_eq!(offset_from_limit(1024, Some(4096)), 4096);
        assert_eq!(offset_from_limit(1024, Some(256)), 1024);
    }

    #[test]
    fn test_offset_defaults_without_usable_limit() {
        assert_eq!(offset_from_limit(1024, None), 1024);
        assert_eq!(offset_from_limit(1024, Some(libc::RLIM_INFINITY)), 1024);
        assert_eq!(offset_from_limit(1024, Some(i32::MAX as libc::rlim_t + 1)), 1024);
    }

    #[test]
    fn test_offset_never_below_floor() {
        assert_eq!(offset_from_limit(3, Some(libc::RLIM_INFINITY)), 1024);
        assert_eq!(offset_from_limit(-5, None), 1024);
        assert_eq!(offset_from_limit(i32::MIN, Some(16)), 1024);
        assert_eq!(offset_from_limit(3, Some(2048)), 2048);
        assert_eq!(offset_from_limit(8192, Some(2048)), 8192);
    }

    #[test]
    fn test_live_limit_offset_at_least_floor() {
        assert!(offset_from_limit(0, hard_nofile_limit()) >= 1024);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_resolve_reaches_real_close() {
        let natives = LibcSockets::resolve().unwrap();
        let mut fds = [0 as c_int; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);

        let n = unsafe { natives.write(fds[1], b"ok".as_ptr() as *const c_void, 2) };
        assert_eq!(n, 2);
        let mut buf = [0u8; 2];
        let n = unsafe { natives.read(fds[0], buf.as_mut_ptr() as *mut c_void, 2) };
        assert_eq!(n, 2);
        assert_eq!(&buf, b"ok");

        assert_eq!(unsafe { natives.close(fds[0]) }, 0);
        assert_eq!(unsafe { natives.close(fds[1]) }, 0);
    }
}
