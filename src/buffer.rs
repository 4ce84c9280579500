//! Per-thread reusable string buffers.
//!
//! Each thread owns one buffer per role. A buffer is truncated before every
//! use and shrunk back after use when one outsized event grew it past
//! [`MAX_RETAINED_CAPACITY`].

use std::cell::RefCell;
use std::thread::LocalKey;

/// Initial capacity of a freshly created buffer.
pub const INITIAL_CAPACITY: usize = 1024;

/// Capacity a buffer is allowed to keep between uses.
pub const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

thread_local! {
    static OUTPUT: RefCell<String> = RefCell::new(String::with_capacity(INITIAL_CAPACITY));
    static SCRATCH: RefCell<String> = RefCell::new(String::with_capacity(INITIAL_CAPACITY));
}

/// Runs `f` with this thread's output buffer, emptied.
///
/// Holds one event's JSON line while it is being built.
pub fn with_output_buffer<R>(f: impl FnOnce(&mut String) -> R) -> R {
    with_pooled(&OUTPUT, f)
}

/// Runs `f` with this thread's scratch buffer, emptied.
///
/// Used to stage text that must be seen whole before it is escaped into the
/// output buffer.
pub fn with_scratch_buffer<R>(f: impl FnOnce(&mut String) -> R) -> R {
    with_pooled(&SCRATCH, f)
}

fn with_pooled<R>(
    key: &'static LocalKey<RefCell<String>>,
    f: impl FnOnce(&mut String) -> R,
) -> R {
    let mut f = Some(f);
    let pooled = key.try_with(|cell| {
        // A nested use on the same thread (a `Display` impl that logs, for
        // example) finds the buffer borrowed and falls back to a fresh one.
        let mut buf = cell.try_borrow_mut().ok()?;
        buf.clear();
        let result = f.take().map(|f| f(&mut *buf));
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            buf.clear();
            buf.shrink_to(MAX_RETAINED_CAPACITY);
        }
        result
    });

    match (pooled, f) {
        (Ok(Some(result)), _) => result,
        // Thread-local already torn down, or the buffer is in use.
        (_, Some(f)) => f(&mut String::with_capacity(INITIAL_CAPACITY)),
        (_, None) => unreachable!("closure consumed without producing a result"),
    }
}
