//! The native scheduler: a single-threaded tokio runtime driving a
//! [`LocalSet`], so promises never leave the thread that created them.

use crate::error::{BridgeError, Fault, FaultDurability, FaultNature};
use crate::promise::Promise;
use std::fmt;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::LocalSet;
use tracing::{debug, warn};

pub struct EventLoop {
    runtime: Runtime,
    local: LocalSet,
}

impl EventLoop {
    pub fn new() -> Result<Self, BridgeError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        debug!("event loop started");
        Ok(EventLoop {
            runtime,
            local: LocalSet::new(),
        })
    }

    /// Drive the loop until `promise` settles.
    ///
    /// Fails with a precondition fault when called from code the loop is
    /// already running, such as a host continuation; `promise` is dropped.
    pub fn wait<T: 'static>(&self, promise: Promise<T>) -> Result<T, Fault> {
        if Self::is_running() {
            warn!("wait() called from inside a running event loop");
            return Err(Fault::new(
                FaultNature::Precondition,
                FaultDurability::Permanent,
                file!(),
                line!(),
                "wait() is not allowed from within event callbacks",
            ));
        }
        self.local.block_on(&self.runtime, promise)
    }

    /// Queue `promise` to run in the background of later turns. A fault is
    /// logged, since nobody is left to observe it.
    pub fn spawn(&self, promise: Promise<()>) {
        self.local.spawn_local(async move {
            if let Err(fault) = promise.await {
                warn!(%fault, "detached promise failed");
            }
        });
    }

    /// Give queued tasks one turn of the loop, then return. Work that
    /// becomes ready during that turn may need another `poll`. Does nothing
    /// when called from inside a running loop.
    pub fn poll(&self) {
        if Self::is_running() {
            warn!("poll() called from inside a running event loop");
            return;
        }
        self.local.block_on(&self.runtime, tokio::task::yield_now());
    }

    /// Whether this thread is already inside a runtime, this one or another.
    fn is_running() -> bool {
        Handle::try_current().is_ok()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop").finish_non_exhaustive()
    }
}
