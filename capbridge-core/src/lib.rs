//! Bridges a dynamically-typed host runtime to a capability RPC engine's
//! single-threaded promise scheduler.
//!
//! Host code attaches continuations to native promises through
//! [`PromiseBridge`]; host callables run via [`ForeignCallAdapter`], and
//! [`ExceptionTranslator`] carries errors across in both directions. Host
//! object lifetimes are tied to Rust ownership through [`HostRef`].

pub mod bridge;
pub mod context;
pub mod error;
pub mod event_loop;
pub mod exception;
pub mod foreign_call;
pub mod host;
pub mod ids;
#[cfg(any(test, feature = "mock-host"))]
pub mod mock;
pub mod ownership;
pub mod promise;
pub mod schema;

pub use bridge::PromiseBridge;
pub use context::CallContext;
pub use error::{BridgeError, Fault, FaultDurability, FaultNature, HostPayload};
pub use event_loop::EventLoop;
pub use exception::{
    ExceptionTranslator, UNKNOWN_ERROR_DESCRIPTION, UNKNOWN_ERROR_FILE, UNKNOWN_ERROR_LINE,
};
pub use foreign_call::ForeignCallAdapter;
pub use host::{ExceptionInfo, HostRuntime};
pub use ids::{CallId, CapId};
pub use ownership::{HostLock, HostRef};
pub use promise::{ForkedPromise, Fulfiller, NativePromise, Promise};
pub use schema::{InterfaceSchema, MethodSchema};
