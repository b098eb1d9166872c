//! An in-memory host runtime for tests.
//!
//! Values are reference-counted the way a dynamic interpreter's objects are:
//! callables and server objects carry an explicit count that
//! [`HostRuntime::incref`]/[`HostRuntime::decref`] adjust, so tests can
//! assert that the bridge releases exactly what it acquires. The interpreter
//! lock is a re-entrant depth counter.

use crate::context::CallContext;
use crate::error::Fault;
use crate::host::{ExceptionInfo, HostRuntime};
use crate::promise::Promise;
use serde_json::Value as Json;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type CallableFn = dyn Fn(&MockHost, Option<MockValue>) -> Result<MockValue, MockException>;
type MethodFn = dyn Fn(&CallContext<MockHost>) -> Result<Option<Promise<()>>, MockException>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockException {
    pub kind: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl MockException {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        MockException {
            kind: kind.into(),
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// What a traceback's last line would show.
    pub fn description(&self) -> String {
        if self.kind == MockHost::FAULT_KIND {
            self.message.clone()
        } else {
            format!("{}: {}", self.kind, self.message)
        }
    }
}

pub struct MockCallable {
    refs: Cell<usize>,
    calls: Cell<usize>,
    body: Box<CallableFn>,
}

pub struct MockObject {
    refs: Cell<usize>,
    dispatched: RefCell<Vec<String>>,
    methods: HashMap<String, Box<MethodFn>>,
}

impl MockObject {
    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.borrow().clone()
    }
}

/// A host value.
#[derive(Clone)]
pub enum MockValue {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<MockValue>),
    Struct(Json),
    Exception(MockException),
    Callable(Rc<MockCallable>),
    Object(Rc<MockObject>),
    Promise(Rc<RefCell<Option<Promise<MockValue>>>>),
}

impl fmt::Debug for MockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockValue::None => f.write_str("None"),
            MockValue::Bool(b) => write!(f, "Bool({})", b),
            MockValue::Int(n) => write!(f, "Int({})", n),
            MockValue::Str(s) => write!(f, "Str({:?})", s),
            MockValue::List(items) => f.debug_tuple("List").field(items).finish(),
            MockValue::Struct(json) => write!(f, "Struct({})", json),
            MockValue::Exception(e) => f.debug_tuple("Exception").field(e).finish(),
            MockValue::Callable(c) => write!(f, "Callable(refs={})", c.refs.get()),
            MockValue::Object(o) => write!(f, "Object(refs={})", o.refs.get()),
            MockValue::Promise(_) => f.write_str("Promise(..)"),
        }
    }
}

impl PartialEq for MockValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MockValue::None, MockValue::None) => true,
            (MockValue::Bool(a), MockValue::Bool(b)) => a == b,
            (MockValue::Int(a), MockValue::Int(b)) => a == b,
            (MockValue::Str(a), MockValue::Str(b)) => a == b,
            (MockValue::List(a), MockValue::List(b)) => a == b,
            (MockValue::Struct(a), MockValue::Struct(b)) => a == b,
            (MockValue::Exception(a), MockValue::Exception(b)) => a == b,
            (MockValue::Callable(a), MockValue::Callable(b)) => Rc::ptr_eq(a, b),
            (MockValue::Object(a), MockValue::Object(b)) => Rc::ptr_eq(a, b),
            (MockValue::Promise(a), MockValue::Promise(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Builds a server object from named method handlers.
#[derive(Default)]
pub struct MockServerBuilder {
    methods: HashMap<String, Box<MethodFn>>,
}

impl MockServerBuilder {
    pub fn method<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&CallContext<MockHost>) -> Result<Option<Promise<()>>, MockException> + 'static,
    {
        self.methods.insert(name.to_string(), Box::new(handler));
        self
    }

    pub fn build(self) -> MockValue {
        MockValue::Object(Rc::new(MockObject {
            refs: Cell::new(1),
            dispatched: RefCell::new(Vec::new()),
            methods: self.methods,
        }))
    }
}

#[derive(Default)]
pub struct MockHost {
    lock_depth: Cell<usize>,
    lock_acquisitions: Cell<usize>,
    conversion_failure: RefCell<Option<MockException>>,
}

impl MockHost {
    /// Exception type produced for wrapped native faults.
    pub const FAULT_KIND: &'static str = "RpcFault";

    pub fn new() -> Self {
        Self::default()
    }

    /// A callable owned once by the test, as if bound to a local variable.
    pub fn callable<F>(&self, body: F) -> MockValue
    where
        F: Fn(&MockHost, Option<MockValue>) -> Result<MockValue, MockException> + 'static,
    {
        MockValue::Callable(Rc::new(MockCallable {
            refs: Cell::new(1),
            calls: Cell::new(0),
            body: Box::new(body),
        }))
    }

    /// A host wrapper around a pending native promise.
    pub fn promise_value(&self, promise: Promise<MockValue>) -> MockValue {
        MockValue::Promise(Rc::new(RefCell::new(Some(promise))))
    }

    pub fn server() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    /// Make every response/aggregate conversion raise `exception`.
    pub fn fail_conversions(&self, exception: MockException) {
        *self.conversion_failure.borrow_mut() = Some(exception);
    }

    pub fn ref_count(&self, value: &MockValue) -> usize {
        match value {
            MockValue::Callable(c) => c.refs.get(),
            MockValue::Object(o) => o.refs.get(),
            _ => 0,
        }
    }

    pub fn call_count(&self, value: &MockValue) -> usize {
        match value {
            MockValue::Callable(c) => c.calls.get(),
            _ => 0,
        }
    }

    pub fn lock_held(&self) -> bool {
        self.lock_depth.get() > 0
    }

    pub fn lock_acquisitions(&self) -> usize {
        self.lock_acquisitions.get()
    }

    fn type_error(message: impl Into<String>) -> MockException {
        MockException::new("TypeError", message)
    }

    fn conversion_check(&self) -> Result<(), MockException> {
        match self.conversion_failure.borrow().as_ref() {
            Some(exception) => Err(exception.clone()),
            None => Ok(()),
        }
    }
}

impl HostRuntime for MockHost {
    type Value = MockValue;
    type Exception = MockException;
    type Payload = Json;

    fn call(&self, callable: &MockValue, arg: Option<MockValue>) -> Result<MockValue, MockException> {
        assert!(self.lock_held(), "host call made without the interpreter lock");
        match callable {
            MockValue::Callable(c) => {
                assert!(c.refs.get() > 0, "call on a released callable");
                c.calls.set(c.calls.get() + 1);
                (c.body)(self, arg)
            }
            other => Err(Self::type_error(format!("{:?} is not callable", other))),
        }
    }

    fn response_to_value(&self, response: Json) -> Result<MockValue, MockException> {
        self.conversion_check()?;
        Ok(MockValue::Struct(response))
    }

    fn aggregate(&self, values: Vec<MockValue>) -> Result<MockValue, MockException> {
        self.conversion_check()?;
        Ok(MockValue::List(values))
    }

    fn wrap_fault(&self, fault: &Fault) -> MockValue {
        MockValue::Exception(self.wrap_fault_for_reraise(fault))
    }

    fn wrap_fault_for_reraise(&self, fault: &Fault) -> MockException {
        MockException::new(Self::FAULT_KIND, fault.description.clone()).at(fault.file.clone(), fault.line)
    }

    fn exception_info(&self, exception: &MockException) -> ExceptionInfo {
        ExceptionInfo {
            filename: exception.file.clone(),
            line: exception.line,
            description: Some(exception.description()),
        }
    }

    fn dispatch_server_method(
        &self,
        server: &MockValue,
        method: &str,
        context: CallContext<Self>,
    ) -> Result<Option<Promise<()>>, MockException> {
        assert!(self.lock_held(), "dispatch made without the interpreter lock");
        let MockValue::Object(object) = server else {
            return Err(Self::type_error("server is not an object"));
        };
        object.dispatched.borrow_mut().push(method.to_string());
        match object.methods.get(method) {
            Some(handler) => handler(&context),
            None => Err(MockException::new(
                "AttributeError",
                format!("server has no method '{}'", method),
            )
            .at("<server>", 1)),
        }
    }

    fn extract_promise(&self, value: &MockValue) -> Option<Promise<MockValue>> {
        match value {
            MockValue::Promise(slot) => slot.borrow_mut().take(),
            _ => None,
        }
    }

    fn none(&self) -> MockValue {
        MockValue::None
    }

    fn is_none(&self, value: &MockValue) -> bool {
        matches!(value, MockValue::None)
    }

    fn incref(&self, value: &MockValue) {
        match value {
            MockValue::Callable(c) => c.refs.set(c.refs.get() + 1),
            MockValue::Object(o) => o.refs.set(o.refs.get() + 1),
            _ => {}
        }
    }

    fn decref(&self, value: &MockValue) {
        let refs = match value {
            MockValue::Callable(c) => &c.refs,
            MockValue::Object(o) => &o.refs,
            _ => return,
        };
        assert!(refs.get() > 0, "reference released more times than acquired");
        refs.set(refs.get() - 1);
    }

    fn acquire_lock(&self) {
        self.lock_depth.set(self.lock_depth.get() + 1);
        self.lock_acquisitions.set(self.lock_acquisitions.get() + 1);
    }

    fn release_lock(&self) {
        self.lock_depth.set(self.lock_depth.get().saturating_sub(1));
    }
}
