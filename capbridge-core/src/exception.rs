//! Conversion of faults and host exceptions across the boundary.

use crate::error::{Fault, HostPayload};
use crate::host::HostRuntime;
use std::rc::Rc;
use tracing::{debug, warn};

pub const UNKNOWN_ERROR_DESCRIPTION: &str = "Unknown error occurred";
pub const UNKNOWN_ERROR_FILE: &str = file!();
pub const UNKNOWN_ERROR_LINE: u32 = line!();

pub struct ExceptionTranslator<R: HostRuntime> {
    runtime: Rc<R>,
}

impl<R: HostRuntime> ExceptionTranslator<R> {
    pub fn new(runtime: Rc<R>) -> Self {
        ExceptionTranslator { runtime }
    }

    /// The fault used whenever no usable host error information exists.
    pub fn unknown_fault() -> Fault {
        Fault::other(
            UNKNOWN_ERROR_FILE,
            UNKNOWN_ERROR_LINE,
            UNKNOWN_ERROR_DESCRIPTION,
        )
    }

    /// Wrap a native fault for delivery to a host error handler.
    pub fn to_host_fault(&self, fault: &Fault) -> R::Value {
        debug!(file = %fault.file, line = fault.line, "delivering fault to host handler");
        self.runtime.wrap_fault(fault)
    }

    /// Build a fault from the host error a call produced, if any.
    ///
    /// The fault reproduces the exception's (file, line, description) triple
    /// exactly and carries the exception itself so it can be restored by
    /// [`reraise`](Self::reraise). With no exception, or one whose triple is
    /// incomplete, the result is [`unknown_fault`](Self::unknown_fault).
    /// Caller must hold the interpreter lock.
    pub fn to_native_fault(&self, pending: Option<R::Exception>) -> Fault {
        let Some(exception) = pending else {
            return Self::unknown_fault();
        };

        match self.runtime.exception_info(&exception).complete() {
            Some((file, line, description)) => {
                debug!(%file, line, %description, "host exception converted to fault");
                Fault::other(file, line, description).with_origin(HostPayload::new(exception))
            }
            None => {
                warn!("host exception info incomplete, reporting unknown error");
                Self::unknown_fault()
            }
        }
    }

    /// Turn a fault back into the exception host code should observe.
    ///
    /// A fault that originated from a host exception restores that exact
    /// exception. Anything else is wrapped by the host.
    pub fn reraise(&self, fault: &Fault) -> R::Exception {
        if let Some(original) = fault
            .origin()
            .and_then(|origin| origin.downcast_ref::<R::Exception>())
        {
            debug!("restoring original host exception");
            return original.clone();
        }
        self.runtime.wrap_fault_for_reraise(fault)
    }
}

impl<R: HostRuntime> Clone for ExceptionTranslator<R> {
    fn clone(&self) -> Self {
        ExceptionTranslator {
            runtime: Rc::clone(&self.runtime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ExceptionInfo;
    use crate::mock::{MockException, MockHost, MockValue};

    fn translator() -> (Rc<MockHost>, ExceptionTranslator<MockHost>) {
        let host = Rc::new(MockHost::new());
        (host.clone(), ExceptionTranslator::new(host))
    }

    #[test]
    fn test_no_pending_error_is_unknown() {
        let (_, translator) = translator();
        let fault = translator.to_native_fault(None);
        assert_eq!(fault.description, UNKNOWN_ERROR_DESCRIPTION);
        assert_eq!(fault.file, UNKNOWN_ERROR_FILE);
        assert_eq!(fault.line, UNKNOWN_ERROR_LINE);
        assert!(!fault.is_reraise());
    }

    #[test]
    fn test_pending_error_reproduces_triple() {
        let (_, translator) = translator();
        let exc = MockException::new("ValueError", "bad input").at("calc.py", 41);
        let fault = translator.to_native_fault(Some(exc));
        assert_eq!(fault.file, "calc.py");
        assert_eq!(fault.line, 41);
        assert_eq!(fault.description, "ValueError: bad input");
        assert!(fault.is_reraise());
    }

    #[test]
    fn test_malformed_info_downgrades_to_unknown() {
        let (_, translator) = translator();
        // No location recorded, so the triple is incomplete.
        let exc = MockException::new("KeyError", "missing");
        let fault = translator.to_native_fault(Some(exc));
        assert_eq!(fault.description, UNKNOWN_ERROR_DESCRIPTION);
        assert!(!fault.is_reraise());
    }

    #[test]
    fn test_reraise_restores_original() {
        let (_, translator) = translator();
        let exc = MockException::new("ZeroDivisionError", "division by zero").at("m.py", 2);
        let fault = translator.to_native_fault(Some(exc.clone()));
        assert_eq!(translator.reraise(&fault), exc);
    }

    #[test]
    fn test_reraise_native_fault_is_wrapped() {
        let (host, translator) = translator();
        let fault = Fault::disconnected("rpc.c++", 77, "connection lost");
        let exc = translator.reraise(&fault);
        assert_eq!(exc.kind, MockHost::FAULT_KIND);
        assert_eq!(exc.message, "connection lost");
        assert_eq!(
            host.exception_info(&exc),
            ExceptionInfo::new("rpc.c++", 77, "connection lost")
        );
    }

    #[test]
    fn test_to_host_fault_preserves_message() {
        let (_, translator) = translator();
        let value = translator.to_host_fault(&Fault::other("x.rs", 5, "remote said no"));
        match value {
            MockValue::Exception(exc) => {
                assert_eq!(exc.message, "remote said no");
                assert_eq!(exc.line, Some(5));
            }
            other => panic!("expected exception value, got {:?}", other),
        }
    }
}
