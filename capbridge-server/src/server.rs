//! Capability servers whose methods are implemented by a host object.

use capbridge_core::{
    CallContext, ExceptionTranslator, Fault, HostLock, HostRef, HostRuntime, InterfaceSchema,
    MethodSchema, Promise,
};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// The native side of a capability: receives calls for methods of one
/// interface and answers each with a promise the scheduler awaits.
pub trait CapabilityServer<R: HostRuntime> {
    fn schema(&self) -> &InterfaceSchema;

    fn call(&self, method: &MethodSchema, context: CallContext<R>) -> Promise<()>;

    /// Resolve a method ordinal against the schema, then [`call`](Self::call).
    fn dispatch(&self, ordinal: u16, context: CallContext<R>) -> Promise<()> {
        match self.schema().method(ordinal).cloned() {
            Some(method) => self.call(&method, context),
            None => Promise::rejected(Fault::unimplemented(
                file!(),
                line!(),
                format!(
                    "method ordinal {} not implemented by {}",
                    ordinal,
                    self.schema().name
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Idle,
    Dispatching,
}

/// Adapts a host object into a [`CapabilityServer`].
///
/// Each inbound call is routed by method name to the host through
/// [`HostRuntime::dispatch_server_method`]. The adapter holds one strong
/// reference to the host object for its whole lifetime and never mutates
/// it; concurrent calls share it.
pub struct HostCapabilityServer<R: HostRuntime> {
    runtime: Rc<R>,
    schema: InterfaceSchema,
    server: HostRef<R>,
    translator: ExceptionTranslator<R>,
    // Host methods may call back into the same adapter.
    dispatch_depth: Cell<usize>,
    in_flight: Rc<Cell<usize>>,
    dispatched: Cell<u64>,
}

impl<R: HostRuntime> HostCapabilityServer<R> {
    pub fn new(runtime: &Rc<R>, schema: InterfaceSchema, server: &R::Value) -> Self {
        debug!(interface = %schema.name, "binding host object as capability server");
        HostCapabilityServer {
            runtime: Rc::clone(runtime),
            server: HostRef::acquire(runtime, server),
            translator: ExceptionTranslator::new(Rc::clone(runtime)),
            schema,
            dispatch_depth: Cell::new(0),
            in_flight: Rc::new(Cell::new(0)),
            dispatched: Cell::new(0),
        }
    }

    pub fn server(&self) -> &R::Value {
        self.server.get()
    }

    pub fn state(&self) -> AdapterState {
        if self.dispatch_depth.get() > 0 {
            AdapterState::Dispatching
        } else {
            AdapterState::Idle
        }
    }

    /// Calls whose host method returned a promise that has not settled yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    /// Total calls handed to the host so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.get()
    }
}

impl<R: HostRuntime> CapabilityServer<R> for HostCapabilityServer<R> {
    fn schema(&self) -> &InterfaceSchema {
        &self.schema
    }

    fn call(&self, method: &MethodSchema, context: CallContext<R>) -> Promise<()> {
        debug!(
            interface = %self.schema.name,
            method = %method.name,
            call = %context.id(),
            "dispatching call to host"
        );

        self.dispatch_depth.set(self.dispatch_depth.get() + 1);
        self.dispatched.set(self.dispatched.get() + 1);
        let outcome = {
            let _lock = HostLock::new(&*self.runtime);
            self.runtime
                .dispatch_server_method(self.server.get(), &method.name, context)
                .map_err(|exception| self.translator.to_native_fault(Some(exception)))
        };
        self.dispatch_depth.set(self.dispatch_depth.get() - 1);

        match outcome {
            Ok(None) => Promise::ready(()),
            Ok(Some(pending)) => {
                let guard = InFlight::enter(&self.in_flight);
                Promise::from_future(async move {
                    let result = pending.await;
                    drop(guard);
                    result
                })
            }
            Err(fault) => {
                warn!(method = %method.name, %fault, "host method raised");
                Promise::rejected(fault)
            }
        }
    }
}

impl<R: HostRuntime> Drop for HostCapabilityServer<R> {
    fn drop(&mut self) {
        debug!(interface = %self.schema.name, "releasing host capability server");
    }
}

impl<R: HostRuntime> fmt::Debug for HostCapabilityServer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCapabilityServer")
            .field("interface", &self.schema.name)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight.get())
            .field("dispatched", &self.dispatched.get())
            .finish()
    }
}

/// Counts one pending host promise until dropped.
struct InFlight(Rc<Cell<usize>>);

impl InFlight {
    fn enter(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        InFlight(Rc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}
