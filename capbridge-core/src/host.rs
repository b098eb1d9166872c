//! The host runtime as seen from the native side.
//!
//! Everything the bridge needs from the dynamically-typed host is expressed
//! through [`HostRuntime`]. Host calls report failure through `Result`
//! instead of a process-wide pending-error flag, so there is nothing to
//! check and clear after each call.

use crate::context::CallContext;
use crate::error::Fault;
use crate::promise::Promise;

/// Location and message recovered from a host exception. Any field the host
/// could not produce is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub filename: Option<String>,
    pub line: Option<u32>,
    pub description: Option<String>,
}

impl ExceptionInfo {
    pub fn new(filename: impl Into<String>, line: u32, description: impl Into<String>) -> Self {
        ExceptionInfo {
            filename: Some(filename.into()),
            line: Some(line),
            description: Some(description.into()),
        }
    }

    /// The complete triple, or `None` if any part is missing.
    pub fn complete(self) -> Option<(String, u32, String)> {
        match self {
            ExceptionInfo {
                filename: Some(filename),
                line: Some(line),
                description: Some(description),
            } => Some((filename, line, description)),
            _ => None,
        }
    }
}

pub trait HostRuntime: Sized + 'static {
    /// A host-observable value. Cloning the handle does not touch the host
    /// reference count; use [`HostRef`](crate::ownership::HostRef) for owned
    /// references.
    type Value: Clone + 'static;
    /// A host exception object.
    type Exception: Clone + 'static;
    /// An opaque RPC struct: responses, call params and call results.
    type Payload: Default + 'static;

    /// Invoke a host callable with zero or one argument.
    fn call(
        &self,
        callable: &Self::Value,
        arg: Option<Self::Value>,
    ) -> Result<Self::Value, Self::Exception>;

    /// Convert an RPC response into something host code can observe.
    fn response_to_value(&self, response: Self::Payload) -> Result<Self::Value, Self::Exception>;

    /// Fold several host values into one aggregate host value.
    fn aggregate(&self, values: Vec<Self::Value>) -> Result<Self::Value, Self::Exception>;

    /// Wrap a fault as an exception value handed to a host error handler.
    fn wrap_fault(&self, fault: &Fault) -> Self::Value;

    /// Wrap a fault as an exception raised into host code.
    fn wrap_fault_for_reraise(&self, fault: &Fault) -> Self::Exception;

    fn exception_info(&self, exception: &Self::Exception) -> ExceptionInfo;

    /// Look up `method` on `server` and call it with the context. `Ok(None)`
    /// means the method finished synchronously.
    fn dispatch_server_method(
        &self,
        server: &Self::Value,
        method: &str,
        context: CallContext<Self>,
    ) -> Result<Option<Promise<()>>, Self::Exception>;

    /// If `value` is a host wrapper around a pending native promise, take it.
    fn extract_promise(&self, value: &Self::Value) -> Option<Promise<Self::Value>>;

    fn none(&self) -> Self::Value;

    fn is_none(&self, value: &Self::Value) -> bool;

    fn incref(&self, value: &Self::Value);

    fn decref(&self, value: &Self::Value);

    /// Take the interpreter lock. Must be re-entrant.
    fn acquire_lock(&self) {}

    fn release_lock(&self) {}
}
