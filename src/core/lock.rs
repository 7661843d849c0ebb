use std::sync::{Mutex, MutexGuard};

fn log_poisoned(lock_type: &str, context: &str) {
    log::error!("{} lock poisoned in {}", lock_type, context);
}

/// Acquires `mutex`, recovering the guard if a previous holder panicked.
///
/// The segment writer relies on this so that `close` can still release the
/// native session after a panic on another thread.
pub fn lock_mutex<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log_poisoned("Mutex", context);
            poisoned.into_inner()
        }
    }
}
