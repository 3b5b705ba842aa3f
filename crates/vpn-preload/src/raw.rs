//! Kernel entry points used while the dispatcher is already active on the
//! current thread, or before the original entry points are resolved.
//!
//! These go through `syscall(2)` so they can never loop back into the
//! interposed symbols.

use libc::{c_int, c_long, c_void, size_t, sockaddr, socklen_t, ssize_t};

#[inline(always)]
pub(crate) unsafe fn close(fd: c_int) -> c_int {
    libc::syscall(libc::SYS_close, fd as c_long) as c_int
}

#[inline(always)]
pub(crate) unsafe fn connect(fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
    libc::syscall(libc::SYS_connect, fd as c_long, addr, len as c_long) as c_int
}

#[inline(always)]
pub(crate) unsafe fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    libc::syscall(libc::SYS_read, fd as c_long, buf, count) as ssize_t
}

#[inline(always)]
pub(crate) unsafe fn recv(fd: c_int, buf: *mut c_void, count: size_t, flags: c_int) -> ssize_t {
    libc::syscall(
        libc::SYS_recvfrom,
        fd as c_long,
        buf,
        count,
        flags as c_long,
        std::ptr::null_mut::<sockaddr>(),
        std::ptr::null_mut::<socklen_t>(),
    ) as ssize_t
}

#[inline(always)]
pub(crate) unsafe fn send(fd: c_int, buf: *const c_void, count: size_t, flags: c_int) -> ssize_t {
    libc::syscall(
        libc::SYS_sendto,
        fd as c_long,
        buf,
        count,
        flags as c_long,
        std::ptr::null::<sockaddr>(),
        0 as c_long,
    ) as ssize_t
}

#[inline(always)]
pub(crate) unsafe fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    libc::syscall(libc::SYS_write, fd as c_long, buf, count) as ssize_t
}

/// Report a fatal condition on stderr without touching interposed symbols
pub(crate) fn write_stderr(msg: &str) {
    let _ = unsafe { write(2, msg.as_ptr() as *const c_void, msg.len()) };
}
