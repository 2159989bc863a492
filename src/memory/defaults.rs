//! Default store sizing.
//!
//! Every store in a pool must hold the largest message the kernel may send:
//! one page of request headers plus the maximum write payload negotiated at
//! mount time.

/// Maximum file write size we are prepared to receive from the kernel.
pub const MAX_WRITE: usize = 16 * 1024 * 1024;

/// Platform page size. All non-data request parts fit in one page.
pub fn system_page_size() -> usize {
    rustix::param::page_size()
}

/// Capacity every store needs for a given page size and max write.
///
/// Returns `None` on overflow.
pub const fn store_capacity(page_size: usize, max_write: usize) -> Option<usize> {
    page_size.checked_add(max_write)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_write() {
        assert_eq!(MAX_WRITE, 16_777_216);
    }

    #[test]
    fn test_system_page_size() {
        let page = system_page_size();
        assert!(page.is_power_of_two());
        assert!(page >= 4096);
    }

    #[test]
    fn test_store_capacity() {
        assert_eq!(store_capacity(4096, MAX_WRITE), Some(4096 + 16_777_216));
        assert_eq!(store_capacity(usize::MAX, 1), None);
    }
}
