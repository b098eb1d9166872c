//! Host reference counting and interpreter lock scoping.

use crate::host::HostRuntime;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Holds the host interpreter lock until dropped.
pub struct HostLock<'a, R: HostRuntime> {
    runtime: &'a R,
}

impl<'a, R: HostRuntime> HostLock<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        runtime.acquire_lock();
        HostLock { runtime }
    }
}

impl<R: HostRuntime> Drop for HostLock<'_, R> {
    fn drop(&mut self) {
        self.runtime.release_lock();
    }
}

/// One strong host reference, released exactly once when dropped.
pub struct HostRef<R: HostRuntime> {
    runtime: Rc<R>,
    value: R::Value,
}

impl<R: HostRuntime> HostRef<R> {
    /// Take a new strong reference to `value`.
    pub fn acquire(runtime: &Rc<R>, value: &R::Value) -> Self {
        {
            let _lock = HostLock::new(&**runtime);
            runtime.incref(value);
        }
        trace!("acquired host reference");
        HostRef {
            runtime: Rc::clone(runtime),
            value: value.clone(),
        }
    }

    /// Take over a reference the caller already owns.
    pub fn adopt(runtime: &Rc<R>, value: R::Value) -> Self {
        HostRef {
            runtime: Rc::clone(runtime),
            value,
        }
    }

    pub fn get(&self) -> &R::Value {
        &self.value
    }

    pub fn runtime(&self) -> &Rc<R> {
        &self.runtime
    }
}

impl<R: HostRuntime> Clone for HostRef<R> {
    fn clone(&self) -> Self {
        Self::acquire(&self.runtime, &self.value)
    }
}

impl<R: HostRuntime> Drop for HostRef<R> {
    fn drop(&mut self) {
        let _lock = HostLock::new(&*self.runtime);
        self.runtime.decref(&self.value);
        trace!("released host reference");
    }
}

impl<R: HostRuntime> fmt::Debug for HostRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRef").finish_non_exhaustive()
    }
}
