//! Remote error code table.
//!
//! Endpoints report failures as the negated portable error code (Linux
//! numbering). The table maps those codes onto the local libc constants so
//! callers see the `errno` values their platform defines.

use libc::c_int;

/// Local errno for codes the table does not know
pub const FALLBACK_ERRNO: c_int = libc::EIO;

const TABLE: &[(i32, c_int)] = &[
    (1, libc::EPERM),
    (2, libc::ENOENT),
    (4, libc::EINTR),
    (5, libc::EIO),
    (9, libc::EBADF),
    (11, libc::EAGAIN),
    (12, libc::ENOMEM),
    (13, libc::EACCES),
    (14, libc::EFAULT),
    (16, libc::EBUSY),
    (22, libc::EINVAL),
    (23, libc::ENFILE),
    (24, libc::EMFILE),
    (28, libc::ENOSPC),
    (32, libc::EPIPE),
    (88, libc::ENOTSOCK),
    (89, libc::EDESTADDRREQ),
    (90, libc::EMSGSIZE),
    (91, libc::EPROTOTYPE),
    (93, libc::EPROTONOSUPPORT),
    (95, libc::EOPNOTSUPP),
    (97, libc::EAFNOSUPPORT),
    (98, libc::EADDRINUSE),
    (99, libc::EADDRNOTAVAIL),
    (100, libc::ENETDOWN),
    (101, libc::ENETUNREACH),
    (102, libc::ENETRESET),
    (103, libc::ECONNABORTED),
    (104, libc::ECONNRESET),
    (105, libc::ENOBUFS),
    (106, libc::EISCONN),
    (107, libc::ENOTCONN),
    (110, libc::ETIMEDOUT),
    (111, libc::ECONNREFUSED),
    (112, libc::EHOSTDOWN),
    (113, libc::EHOSTUNREACH),
    (114, libc::EALREADY),
    (115, libc::EINPROGRESS),
];

/// Map a remote error code (already negated back to positive) to a local errno
pub fn to_local(code: i32) -> c_int {
    TABLE
        .iter()
        .find(|(remote, _)| *remote == code)
        .map(|(_, local)| *local)
        .unwrap_or(FALLBACK_ERRNO)
}

/// Map a negative remote result to a local errno.
///
/// Returns `None` for non-negative results, which are not failures.
pub fn from_result(result: i32) -> Option<c_int> {
    if result < 0 {
        Some(to_local(result.checked_neg().unwrap_or(i32::MAX)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(to_local(5), libc::EIO);
        assert_eq!(to_local(111), libc::ECONNREFUSED);
        assert_eq!(to_local(104), libc::ECONNRESET);
    }

    #[test]
    fn test_unknown_code_falls_back() {
        assert_eq!(to_local(9999), FALLBACK_ERRNO);
        assert_eq!(to_local(0), FALLBACK_ERRNO);
    }

    #[test]
    fn test_from_result_negates() {
        assert_eq!(from_result(-111), Some(libc::ECONNREFUSED));
        assert_eq!(from_result(i32::MIN), Some(FALLBACK_ERRNO));
        assert_eq!(from_result(0), None);
        assert_eq!(from_result(12), None);
    }

    #[test]
    fn test_table_has_no_duplicate_codes() {
        for (i, (a, _)) in TABLE.iter().enumerate() {
            assert!(TABLE[i + 1..].iter().all(|(b, _)| a != b), "duplicate code {}", a);
        }
    }
}
