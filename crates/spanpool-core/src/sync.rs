//! Mutual exclusion for allocator state.
//!
//! Allocator critical sections are short and bounded (one linear pass over
//! a block list at most), so a busy-wait lock is used instead of an
//! OS-parked mutex. The lock is built on an atomic flag; it gives no
//! fairness guarantee and does not guard against priority inversion.

/// Spin lock guarding mutable allocator state.
pub type SpinLock<T> = spin::Mutex<T>;

/// RAII guard returned by locking a [`SpinLock`].
pub type SpinGuard<'a, T> = spin::MutexGuard<'a, T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lock_serializes_increments() {
        let counter = Arc::new(SpinLock::new(0usize));
        std::thread::scope(|s| {
            for _ in 0..4 {
                let counter = Arc::clone(&counter);
                s.spawn(move || {
                    for _ in 0..1000 {
                        *counter.lock() += 1;
                    }
                });
            }
        });
        assert_eq!(*counter.lock(), 4000);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = SpinLock::new(());
        let guard: SpinGuard<'_, ()> = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }
}
