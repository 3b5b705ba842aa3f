//! Interception dispatcher.
//!
//! Each entry point either passes the call to the original primitive or
//! forwards it to the endpoint owning the descriptor. Failures are reported
//! the way the replaced primitive reports them: `-1` and `errno`.

use libc::{c_int, c_void, size_t, sockaddr, socklen_t, ssize_t};
use std::sync::Arc;

use vpn_config::{log_preload_debug, log_preload_warn, log_rpc_debug, log_table_debug};

use crate::fd_table::{Resolved, VirtualFdTable};
use crate::policy::{Destination, Locality, RemotePolicy};
use crate::reals::NativeSockets;
use crate::registry::RemoteRegistry;
use crate::rpc::{Connector, RemoteCall, RemoteReply};
use crate::set_errno;

/// Largest transfer forwarded in one call; callers see a short count beyond it
pub const MAX_CHUNK: usize = 1024 * 1024;

/// errno for a remote call that could not be completed
pub const TRANSPORT_ERRNO: c_int = libc::EIO;
/// errno when no endpoint serves a remote destination
pub const NO_ENDPOINT_ERRNO: c_int = libc::EHOSTUNREACH;
/// errno when no virtual descriptor can be allocated
pub const EXHAUSTED_ERRNO: c_int = libc::EMFILE;

/// Coordinator owning the tables and the original entry points
pub struct Interceptor<N: NativeSockets> {
    natives: N,
    policy: Arc<dyn RemotePolicy>,
    registry: RemoteRegistry,
    fds: VirtualFdTable,
}

#[inline]
unsafe fn fail(errno: c_int) -> c_int {
    set_errno(errno);
    -1
}

/// Report a negative remote result through the error table
#[inline]
unsafe fn fail_remote(result: i32) -> c_int {
    fail(vpn_ipc::errno::from_result(result).unwrap_or(vpn_ipc::errno::FALLBACK_ERRNO))
}

impl<N: NativeSockets> Interceptor<N> {
    pub fn new(
        natives: N,
        policy: Arc<dyn RemotePolicy>,
        connector: Box<dyn Connector>,
        interface: impl Into<String>,
        offset: c_int,
    ) -> Self {
        Self {
            registry: RemoteRegistry::new(interface, Arc::clone(&policy), connector),
            natives,
            policy,
            fds: VirtualFdTable::new(offset),
        }
    }

    pub fn natives(&self) -> &N {
        &self.natives
    }

    pub fn registry(&self) -> &RemoteRegistry {
        &self.registry
    }

    pub fn descriptors(&self) -> &VirtualFdTable {
        &self.fds
    }

    fn forward(&self, target: &Resolved, call: RemoteCall<'_>) -> Option<RemoteReply> {
        match target.client.call(call) {
            Ok(reply) => {
                log_rpc_debug!(
                    "remote call",
                    op = call.op_name(),
                    host = target.client.host(),
                    remote_fd = target.remote_fd,
                    result = reply.result,
                );
                Some(reply)
            }
            Err(e) => {
                log_preload_warn!(
                    "remote call failed",
                    op = call.op_name(),
                    host = target.client.host(),
                    error = tracing::field::display(&e),
                );
                None
            }
        }
    }

    pub unsafe fn close(&self, fd: c_int) -> c_int {
        let Some(target) = self.fds.resolve(fd) else {
            return self.natives.close(fd);
        };

        let Some(reply) = self.forward(&target, RemoteCall::Close { fd: target.remote_fd }) else {
            return fail(TRANSPORT_ERRNO);
        };
        if reply.result < 0 {
            return fail_remote(reply.result);
        }

        if let Err(e) = self.fds.deregister(&target.client, fd) {
            // Another thread closed it between resolve and here
            log_table_debug!("deregister skipped", vfd = fd, error = tracing::field::display(&e));
        } else {
            log_table_debug!("virtual descriptor released", vfd = fd);
        }
        reply.result
    }

    pub unsafe fn connect(&self, fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
        let dest = Destination::from_raw(addr, len);
        if self.policy.classify(&dest) == Locality::Local {
            return self.natives.connect(fd, addr, len);
        }

        let Some(client) = self.registry.get_or_create(&dest) else {
            return fail(NO_ENDPOINT_ERRNO);
        };
        let target = Resolved {
            client,
            remote_fd: fd,
        };

        let call = RemoteCall::Connect {
            fd,
            target: dest.socket_addr(),
        };
        let Some(reply) = self.forward(&target, call) else {
            return fail(TRANSPORT_ERRNO);
        };
        if reply.result < 0 {
            return fail_remote(reply.result);
        }

        match self.fds.register(&target.client, reply.result) {
            Ok(vfd) => {
                log_table_debug!("virtual descriptor bound", vfd = vfd, remote_fd = reply.result);
                vfd
            }
            Err(e) => {
                log_preload_warn!("cannot bind virtual descriptor", error = tracing::field::display(&e));
                let orphan = Resolved {
                    client: target.client,
                    remote_fd: reply.result,
                };
                let _ = self.forward(&orphan, RemoteCall::Close { fd: reply.result });
                fail(EXHAUSTED_ERRNO)
            }
        }
    }

    pub unsafe fn read(&self, fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
        match self.fds.resolve(fd) {
            Some(target) => self.recv_remote(&target, buf, count, 0),
            None => self.natives.read(fd, buf, count),
        }
    }

    pub unsafe fn recv(&self, fd: c_int, buf: *mut c_void, count: size_t, flags: c_int) -> ssize_t {
        match self.fds.resolve(fd) {
            Some(target) => self.recv_remote(&target, buf, count, flags),
            None => self.natives.recv(fd, buf, count, flags),
        }
    }

    pub unsafe fn send(&self, fd: c_int, buf: *const c_void, count: size_t, flags: c_int) -> ssize_t {
        match self.fds.resolve(fd) {
            Some(target) => self.send_remote(&target, buf, count, flags),
            None => self.natives.send(fd, buf, count, flags),
        }
    }

    pub unsafe fn write(&self, fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
        match self.fds.resolve(fd) {
            Some(target) => self.send_remote(&target, buf, count, 0),
            None => self.natives.write(fd, buf, count),
        }
    }

    unsafe fn recv_remote(
        &self,
        target: &Resolved,
        buf: *mut c_void,
        count: size_t,
        flags: c_int,
    ) -> ssize_t {
        if buf.is_null() && count > 0 {
            return fail(libc::EFAULT) as ssize_t;
        }
        let count = count.min(MAX_CHUNK);
        let call = RemoteCall::Recv {
            fd: target.remote_fd,
            count: count as u32,
            flags,
        };
        // reply.data is the transient buffer, dropped on every path
        let Some(reply) = self.forward(target, call) else {
            return fail(TRANSPORT_ERRNO) as ssize_t;
        };
        if reply.result < 0 {
            return fail_remote(reply.result) as ssize_t;
        }

        let n = (reply.result as usize).min(reply.data.len()).min(count);
        if n < reply.result as usize {
            log_preload_debug!("short recv payload", reported = reply.result, copied = n);
        }
        if n > 0 {
            std::ptr::copy_nonoverlapping(reply.data.as_ptr(), buf as *mut u8, n);
        }
        n as ssize_t
    }

    unsafe fn send_remote(
        &self,
        target: &Resolved,
        buf: *const c_void,
        count: size_t,
        flags: c_int,
    ) -> ssize_t {
        if buf.is_null() && count > 0 {
            return fail(libc::EFAULT) as ssize_t;
        }
        let count = count.min(MAX_CHUNK);
        let data: &[u8] = if count == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(buf as *const u8, count)
        };

        let call = RemoteCall::Send {
            fd: target.remote_fd,
            data,
            flags,
        };
        let Some(reply) = self.forward(target, call) else {
            return fail(TRANSPORT_ERRNO) as ssize_t;
        };
        if reply.result < 0 {
            return fail_remote(reply.result) as ssize_t;
        }
        reply.result as ssize_t
    }
}
