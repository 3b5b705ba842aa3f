//! Exported C entry points.
//!
//! The dynamic linker resolves the application's socket calls to these
//! symbols. Nested calls from inside the dispatcher go straight to the
//! kernel.

use libc::{c_int, c_void, size_t, sockaddr, socklen_t, ssize_t};

use crate::raw;
use crate::state::{interceptor, DispatchGuard};

#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    let Some(_guard) = DispatchGuard::enter() else {
        return raw::close(fd);
    };
    interceptor().close(fd)
}

#[no_mangle]
pub unsafe extern "C" fn connect(fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
    let Some(_guard) = DispatchGuard::enter() else {
        return raw::connect(fd, addr, len);
    };
    interceptor().connect(fd, addr, len)
}

#[no_mangle]
pub unsafe extern "C" fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    let Some(_guard) = DispatchGuard::enter() else {
        return raw::read(fd, buf, count);
    };
    interceptor().read(fd, buf, count)
}

#[no_mangle]
pub unsafe extern "C" fn recv(fd: c_int, buf: *mut c_void, count: size_t, flags: c_int) -> ssize_t {
    let Some(_guard) = DispatchGuard::enter() else {
        return raw::recv(fd, buf, count, flags);
    };
    interceptor().recv(fd, buf, count, flags)
}

#[no_mangle]
pub unsafe extern "C" fn send(fd: c_int, buf: *const c_void, count: size_t, flags: c_int) -> ssize_t {
    let Some(_guard) = DispatchGuard::enter() else {
        return raw::send(fd, buf, count, flags);
    };
    interceptor().send(fd, buf, count, flags)
}

#[no_mangle]
pub unsafe extern "C" fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    let Some(_guard) = DispatchGuard::enter() else {
        return raw::write(fd, buf, count);
    };
    interceptor().write(fd, buf, count)
}
