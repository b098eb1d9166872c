use crate::host::HostRuntime;
use crate::ids::CallId;
use crate::schema::MethodSchema;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One in-flight inbound call: the method being invoked, its params, and the
/// slot the eventual results are written to.
///
/// Cloning yields another handle onto the same call.
pub struct CallContext<R: HostRuntime> {
    inner: Rc<CallState<R>>,
}

struct CallState<R: HostRuntime> {
    id: CallId,
    interface: String,
    method: MethodSchema,
    params: R::Payload,
    results: RefCell<Option<R::Payload>>,
}

impl<R: HostRuntime> CallContext<R> {
    pub fn new(interface: impl Into<String>, method: MethodSchema, params: R::Payload) -> Self {
        CallContext {
            inner: Rc::new(CallState {
                id: CallId::next(),
                interface: interface.into(),
                method,
                params,
                results: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> CallId {
        self.inner.id
    }

    pub fn interface(&self) -> &str {
        &self.inner.interface
    }

    pub fn method(&self) -> &MethodSchema {
        &self.inner.method
    }

    pub fn method_name(&self) -> &str {
        &self.inner.method.name
    }

    pub fn params(&self) -> &R::Payload {
        &self.inner.params
    }

    pub fn set_results(&self, results: R::Payload) {
        *self.inner.results.borrow_mut() = Some(results);
    }

    pub fn has_results(&self) -> bool {
        self.inner.results.borrow().is_some()
    }

    /// Take the results, or the empty struct if none were set.
    pub fn take_results(&self) -> R::Payload {
        self.inner.results.borrow_mut().take().unwrap_or_default()
    }
}

impl<R: HostRuntime> Clone for CallContext<R> {
    fn clone(&self) -> Self {
        CallContext {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R: HostRuntime> fmt::Debug for CallContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("id", &self.inner.id)
            .field("interface", &self.inner.interface)
            .field("method", &self.inner.method.name)
            .finish()
    }
}
