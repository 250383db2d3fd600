use parking_lot::{ReentrantMutex as RawReentrant, ReentrantMutexGuard};
use std::time::Duration;

/// Lock that the owning thread may acquire again without deadlocking.
///
/// Each `lock` returns a guard; the lock is released when the outermost guard drops.
/// Guards only give shared access, wrap the data in a `Cell` or `RefCell` to mutate it.
pub struct ReentrantMutex<T> {
    inner: RawReentrant<T>,
}

pub type ReentrantGuard<'a, T> = ReentrantMutexGuard<'a, T>;

impl<T> ReentrantMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RawReentrant::new(value),
        }
    }

    /// Blocks until the lock is free or already held by this thread.
    pub fn lock(&self) -> ReentrantGuard<'_, T> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<ReentrantGuard<'_, T>> {
        self.inner.try_lock()
    }

    pub fn try_lock_for(&self, timeout: Duration) -> Option<ReentrantGuard<'_, T>> {
        self.inner.try_lock_for(timeout)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn is_owned_by_current_thread(&self) -> bool {
        self.inner.is_owned_by_current_thread()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for ReentrantMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_nested_locking_on_one_thread() {
        let lock = ReentrantMutex::new(Cell::new(0));

        let fn1 = |lock: &ReentrantMutex<Cell<i32>>| {
            let guard = lock.lock();
            guard.set(100);
        };
        let fn2 = |lock: &ReentrantMutex<Cell<i32>>| {
            let _guard = lock.lock();
            fn1(lock);
        };
        let fn3 = |lock: &ReentrantMutex<Cell<i32>>| {
            let _guard = lock.lock();
            assert!(lock.is_owned_by_current_thread());
            fn2(lock);
        };

        fn3(&lock);
        assert!(!lock.is_locked());
        assert_eq!(lock.into_inner().get(), 100);
    }

    #[test]
    fn test_other_threads_are_excluded() {
        let lock = Arc::new(ReentrantMutex::new(()));
        let guard = lock.lock();
        let _again = lock.lock();

        let (tx, rx) = mpsc::channel();
        let contender = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            tx.send(contender.try_lock().is_none()).unwrap();
            assert!(!contender.is_owned_by_current_thread());
        });

        assert!(rx.recv().unwrap());
        handle.join().unwrap();
        drop(guard);
    }

    #[test]
    fn test_released_after_outermost_guard() {
        let lock = Arc::new(ReentrantMutex::new(()));
        {
            let _outer = lock.lock();
            {
                let _inner = lock.lock();
            }
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());

        let contender = Arc::clone(&lock);
        let acquired = thread::spawn(move || {
            let guard = contender.try_lock_for(Duration::from_millis(50));
            guard.is_some()
        })
        .join()
        .unwrap();
        assert!(acquired);
    }
}
