//! Native-side handles onto capability servers.
//!
//! All three constructors build the same [`HostCapabilityServer`] over the
//! same schema and host object; they differ only in the wrapper returned.

use crate::server::{CapabilityServer, HostCapabilityServer};
use capbridge_core::{CallContext, Fault, HostRuntime, InterfaceSchema, Promise};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// A bare capability.
pub type Capability<R> = Rc<dyn CapabilityServer<R>>;

/// Client stub for invoking a capability by method name.
pub struct CapabilityClient<R: HostRuntime> {
    server: Capability<R>,
}

impl<R: HostRuntime> CapabilityClient<R> {
    pub fn from_capability(server: Capability<R>) -> Self {
        CapabilityClient { server }
    }

    pub fn schema(&self) -> &InterfaceSchema {
        self.server.schema()
    }

    pub fn capability(&self) -> &Capability<R> {
        &self.server
    }

    /// Invoke a method locally. The returned promise resolves to whatever
    /// the server left in the results slot, or an empty payload.
    pub fn call(&self, method_name: &str, params: R::Payload) -> Promise<R::Payload> {
        let schema = self.server.schema();
        let Some(method) = schema.method_by_name(method_name).cloned() else {
            return Promise::rejected(Fault::unimplemented(
                file!(),
                line!(),
                format!("{} has no method named {}", schema.name, method_name),
            ));
        };

        let context = CallContext::new(schema.name.clone(), method.clone(), params);
        trace!(call = %context.id(), method = %method.name, "client call");
        let results = context.clone();
        self.server
            .dispatch(method.ordinal, context)
            .map(move |()| results.take_results())
    }
}

impl<R: HostRuntime> Clone for CapabilityClient<R> {
    fn clone(&self) -> Self {
        CapabilityClient {
            server: Rc::clone(&self.server),
        }
    }
}

impl<R: HostRuntime> fmt::Debug for CapabilityClient<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityClient")
            .field("interface", &self.server.schema().name)
            .finish()
    }
}

/// A capability as seen by generic, schema-driven native code.
pub enum DynamicValue<R: HostRuntime> {
    Capability(Capability<R>),
}

impl<R: HostRuntime> DynamicValue<R> {
    pub fn as_capability(&self) -> &Capability<R> {
        let DynamicValue::Capability(cap) = self;
        cap
    }

    pub fn into_client(self) -> CapabilityClient<R> {
        let DynamicValue::Capability(cap) = self;
        CapabilityClient::from_capability(cap)
    }
}

impl<R: HostRuntime> fmt::Debug for DynamicValue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.as_capability().schema().name)
    }
}

pub fn server_to_client<R: HostRuntime>(
    runtime: &Rc<R>,
    schema: InterfaceSchema,
    server: &R::Value,
) -> Capability<R> {
    Rc::new(HostCapabilityServer::new(runtime, schema, server))
}

pub fn new_client<R: HostRuntime>(
    runtime: &Rc<R>,
    schema: InterfaceSchema,
    server: &R::Value,
) -> CapabilityClient<R> {
    CapabilityClient::from_capability(server_to_client(runtime, schema, server))
}

pub fn new_server<R: HostRuntime>(
    runtime: &Rc<R>,
    schema: InterfaceSchema,
    server: &R::Value,
) -> DynamicValue<R> {
    DynamicValue::Capability(server_to_client(runtime, schema, server))
}
