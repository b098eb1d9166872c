//! Attaching host continuations to native promises.
//!
//! [`PromiseBridge::then`] is the `.then(success, error)` host code sees. It
//! accepts any of the four [`NativePromise`] shapes and always yields a
//! promise of a host value, so continuations chain uniformly regardless of
//! what the underlying RPC operation produced.

use crate::error::Fault;
use crate::event_loop::EventLoop;
use crate::exception::ExceptionTranslator;
use crate::foreign_call::ForeignCallAdapter;
use crate::host::HostRuntime;
use crate::ownership::{HostLock, HostRef};
use crate::promise::{NativePromise, Promise};
use std::rc::Rc;
use tracing::{debug, trace};

pub struct PromiseBridge<R: HostRuntime> {
    runtime: Rc<R>,
    calls: ForeignCallAdapter<R>,
}

impl<R: HostRuntime> PromiseBridge<R> {
    pub fn new(runtime: Rc<R>) -> Self {
        let calls = ForeignCallAdapter::new(Rc::clone(&runtime));
        PromiseBridge { runtime, calls }
    }

    pub fn runtime(&self) -> &Rc<R> {
        &self.runtime
    }

    pub fn translator(&self) -> &ExceptionTranslator<R> {
        self.calls.translator()
    }

    /// Host-facing entry: takes fresh references to both handlers and treats
    /// a host `None` error handler as absent.
    pub fn attach(
        &self,
        promise: NativePromise<R>,
        on_success: &R::Value,
        on_error: &R::Value,
    ) -> Promise<R::Value> {
        let absent = {
            let _lock = HostLock::new(&*self.runtime);
            self.runtime.is_none(on_error)
        };
        let on_error = if absent {
            None
        } else {
            Some(HostRef::acquire(&self.runtime, on_error))
        };
        self.then(promise, HostRef::acquire(&self.runtime, on_success), on_error)
    }

    /// Chain `on_success` and, optionally, `on_error` onto `promise`.
    ///
    /// Exactly one handler runs, once. Without an error handler a fault of
    /// `promise` propagates unmodified. A fault raised by whichever handler
    /// runs always propagates. Dropping the returned promise before it
    /// resolves releases both handlers without calling them.
    pub fn then(
        &self,
        promise: NativePromise<R>,
        on_success: HostRef<R>,
        on_error: Option<HostRef<R>>,
    ) -> Promise<R::Value> {
        trace!(shape = promise.kind(), has_error_handler = on_error.is_some(), "attaching host continuation");
        match promise {
            NativePromise::Value(p) => {
                self.chain(p, on_error, move |calls, value| calls.invoke(on_success, value))
            }
            NativePromise::Response(p) => self.chain(p, on_error, move |calls, response| {
                calls.invoke_with_response(on_success, response)
            }),
            NativePromise::Void(p) => self.chain(p, on_error, move |calls, ()| calls.trigger(on_success)),
            NativePromise::Array(p) => self.chain(p, on_error, move |calls, values| {
                calls.invoke_with_aggregate(on_success, values)
            }),
        }
    }

    fn chain<T, F>(&self, promise: Promise<T>, on_error: Option<HostRef<R>>, on_success: F) -> Promise<R::Value>
    where
        T: 'static,
        F: FnOnce(&ForeignCallAdapter<R>, T) -> Promise<R::Value> + 'static,
    {
        let calls = self.calls.clone();
        match on_error {
            None => promise.then(move |value| on_success(&calls, value)),
            Some(handler) => {
                let error_calls = self.calls.clone();
                promise.then_else(
                    move |value| on_success(&calls, value),
                    move |fault| error_calls.invoke_with_fault(handler, &fault),
                )
            }
        }
    }

    /// Convert without a host callback, for callers that wait synchronously.
    /// A void promise resolves to the host's `None`.
    pub fn to_host_promise(&self, promise: NativePromise<R>) -> Promise<R::Value> {
        match promise {
            NativePromise::Value(p) => p,
            NativePromise::Response(p) => {
                let calls = self.calls.clone();
                p.then(move |response| Promise::from_result(calls.response_to_value(response)))
            }
            NativePromise::Void(p) => {
                let runtime = Rc::clone(&self.runtime);
                p.map(move |()| {
                    let _lock = HostLock::new(&*runtime);
                    runtime.none()
                })
            }
            NativePromise::Array(p) => {
                let calls = self.calls.clone();
                p.then(move |values| Promise::from_result(calls.aggregate(values)))
            }
        }
    }

    /// Run the event loop until `promise` settles, surfacing a fault as the
    /// host exception host code should observe.
    pub fn wait(&self, event_loop: &EventLoop, promise: Promise<R::Value>) -> Result<R::Value, R::Exception> {
        event_loop.wait(promise).map_err(|fault| self.reraise(&fault))
    }

    pub fn reraise(&self, fault: &Fault) -> R::Exception {
        debug!(%fault, "fault reached host code");
        let _lock = HostLock::new(&*self.runtime);
        self.translator().reraise(fault)
    }
}

impl<R: HostRuntime> Clone for PromiseBridge<R> {
    fn clone(&self) -> Self {
        PromiseBridge {
            runtime: Rc::clone(&self.runtime),
            calls: self.calls.clone(),
        }
    }
}
