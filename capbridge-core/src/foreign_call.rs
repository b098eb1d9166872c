//! Invoking host callables from native continuations.

use crate::error::Fault;
use crate::exception::ExceptionTranslator;
use crate::host::HostRuntime;
use crate::ownership::{HostLock, HostRef};
use crate::promise::Promise;
use std::rc::Rc;
use tracing::{debug, trace};

/// Calls host callables and turns their outcome into a promise.
///
/// Every entry point consumes the callable's [`HostRef`] and releases it as
/// soon as the host call returns, whether it raised or not, before the
/// outcome is chained any further.
pub struct ForeignCallAdapter<R: HostRuntime> {
    runtime: Rc<R>,
    translator: ExceptionTranslator<R>,
}

impl<R: HostRuntime> ForeignCallAdapter<R> {
    pub fn new(runtime: Rc<R>) -> Self {
        let translator = ExceptionTranslator::new(Rc::clone(&runtime));
        ForeignCallAdapter {
            runtime,
            translator,
        }
    }

    pub fn translator(&self) -> &ExceptionTranslator<R> {
        &self.translator
    }

    /// Result-consuming call: `callable(arg)`.
    pub fn invoke(&self, callable: HostRef<R>, arg: R::Value) -> Promise<R::Value> {
        self.call(callable, Some(arg))
    }

    /// Trigger call: `callable()`.
    pub fn trigger(&self, callable: HostRef<R>) -> Promise<R::Value> {
        self.call(callable, None)
    }

    /// Error-handler call: `handler(exception)` where the exception wraps
    /// `fault`.
    pub fn invoke_with_fault(&self, handler: HostRef<R>, fault: &Fault) -> Promise<R::Value> {
        let exception = {
            let _lock = HostLock::new(&*self.runtime);
            self.translator.to_host_fault(fault)
        };
        self.invoke(handler, exception)
    }

    /// Convert an RPC response for the host, then call `callable` with it.
    pub fn invoke_with_response(&self, callable: HostRef<R>, response: R::Payload) -> Promise<R::Value> {
        match self.response_to_value(response) {
            Ok(value) => self.invoke(callable, value),
            Err(fault) => {
                drop(callable);
                Promise::rejected(fault)
            }
        }
    }

    /// Aggregate `values` into one host value, then call `callable` with it.
    pub fn invoke_with_aggregate(&self, callable: HostRef<R>, values: Vec<R::Value>) -> Promise<R::Value> {
        match self.aggregate(values) {
            Ok(value) => self.invoke(callable, value),
            Err(fault) => {
                drop(callable);
                Promise::rejected(fault)
            }
        }
    }

    fn call(&self, callable: HostRef<R>, arg: Option<R::Value>) -> Promise<R::Value> {
        trace!(with_arg = arg.is_some(), "invoking host callable");
        let _lock = HostLock::new(&*self.runtime);
        let result = self.runtime.call(callable.get(), arg);
        drop(callable);

        match result {
            Ok(value) => self.flatten(value),
            Err(exception) => {
                let fault = self.translator.to_native_fault(Some(exception));
                debug!(%fault, "host callable raised");
                Promise::rejected(fault)
            }
        }
    }

    /// Unwrap one level of host-held promise; a plain value resolves as-is.
    /// Caller must hold the interpreter lock.
    fn flatten(&self, value: R::Value) -> Promise<R::Value> {
        match self.runtime.extract_promise(&value) {
            Some(nested) => {
                trace!("host callable returned a pending promise");
                nested
            }
            None => Promise::ready(value),
        }
    }

    /// Fold `values` into one host value, translating a host failure.
    pub(crate) fn aggregate(&self, values: Vec<R::Value>) -> Result<R::Value, Fault> {
        let _lock = HostLock::new(&*self.runtime);
        self.runtime
            .aggregate(values)
            .map_err(|exception| self.translator.to_native_fault(Some(exception)))
    }

    pub(crate) fn response_to_value(&self, response: R::Payload) -> Result<R::Value, Fault> {
        let _lock = HostLock::new(&*self.runtime);
        self.runtime
            .response_to_value(response)
            .map_err(|exception| self.translator.to_native_fault(Some(exception)))
    }
}

impl<R: HostRuntime> Clone for ForeignCallAdapter<R> {
    fn clone(&self) -> Self {
        ForeignCallAdapter {
            runtime: Rc::clone(&self.runtime),
            translator: self.translator.clone(),
        }
    }
}
