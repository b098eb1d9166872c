// Capability server dispatch tests
// Host objects served as capabilities: routing by method name, completion
// shapes, fault translation, reference lifetime and the client round trip
// through the promise bridge.

use capbridge_core::mock::{MockException, MockHost, MockValue};
use capbridge_core::{
    CallContext, EventLoop, InterfaceSchema, NativePromise, Promise, PromiseBridge,
};
use capbridge_server::{
    new_client, new_server, server_to_client, AdapterState, CapTable, CapabilityServer,
    HostCapabilityServer,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn schema() -> InterfaceSchema {
    InterfaceSchema::new(0xfeed, "Widget")
        .with_method("Foo")
        .with_method("Bar")
        .with_method("Later")
}

fn context(method: &str, params: serde_json::Value) -> CallContext<MockHost> {
    let schema = schema();
    let method = schema.method_by_name(method).cloned().unwrap();
    CallContext::new(schema.name, method, params)
}

fn dispatched(object: &MockValue) -> Vec<String> {
    match object {
        MockValue::Object(o) => o.dispatched(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod routing_tests {
    use super::*;

    #[tokio::test]
    async fn test_method_dispatched_once_with_its_context() {
        let host = Rc::new(MockHost::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let object = MockHost::server()
            .method("Foo", move |ctx| {
                log.borrow_mut()
                    .push((ctx.method_name().to_string(), ctx.params().clone()));
                Ok(None)
            })
            .build();
        let adapter = HostCapabilityServer::new(&host, schema(), &object);

        adapter
            .dispatch(0, context("Foo", json!({"x": 1})))
            .await
            .unwrap();

        assert_eq!(dispatched(&object), vec!["Foo".to_string()]);
        assert_eq!(*seen.borrow(), vec![("Foo".to_string(), json!({"x": 1}))]);
        assert_eq!(adapter.dispatched(), 1);
    }

    #[tokio::test]
    async fn test_no_further_work_completes_immediately() {
        let host = Rc::new(MockHost::new());
        let object = MockHost::server().method("Bar", |_| Ok(None)).build();
        let adapter = HostCapabilityServer::new(&host, schema(), &object);

        let promise = adapter.dispatch(1, context("Bar", json!({})));
        assert_eq!(adapter.in_flight(), 0);
        promise.await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_host_promise_is_awaited() {
        let host = Rc::new(MockHost::new());
        let (pending, fulfiller) = Promise::pair();
        let slot = RefCell::new(Some(pending));
        let object = MockHost::server()
            .method("Later", move |_| Ok(slot.borrow_mut().take()))
            .build();
        let adapter = HostCapabilityServer::new(&host, schema(), &object);

        let ctx = context("Later", json!({}));
        let promise = adapter.dispatch(2, ctx.clone());
        assert_eq!(adapter.in_flight(), 1);

        ctx.set_results(json!({"done": true}));
        fulfiller.fulfill(());
        promise.await.unwrap();
        assert_eq!(adapter.in_flight(), 0);
        assert_eq!(ctx.take_results(), json!({"done": true}));
    }

    #[tokio::test]
    async fn test_pending_host_promise_fault_propagates() {
        let host = Rc::new(MockHost::new());
        let (pending, fulfiller) = Promise::<()>::pair();
        let slot = RefCell::new(Some(pending));
        let object = MockHost::server()
            .method("Later", move |_| Ok(slot.borrow_mut().take()))
            .build();
        let adapter = HostCapabilityServer::new(&host, schema(), &object);

        let promise = adapter.dispatch(2, context("Later", json!({})));
        drop(fulfiller);
        assert!(promise.await.is_err());
        assert_eq!(adapter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_synchronous_raise_becomes_fault() {
        let host = Rc::new(MockHost::new());
        let object = MockHost::server()
            .method("Foo", |_| {
                Err(MockException::new("ValueError", "bad widget").at("widget.py", 21))
            })
            .build();
        let adapter = HostCapabilityServer::new(&host, schema(), &object);

        let fault = adapter
            .dispatch(0, context("Foo", json!({})))
            .await
            .unwrap_err();
        assert_eq!(fault.file, "widget.py");
        assert_eq!(fault.line, 21);
        assert_eq!(fault.description, "ValueError: bad widget");
        assert!(fault.is_reraise());
        assert_eq!(adapter.state(), AdapterState::Idle);
        assert!(!host.lock_held());
    }

    #[tokio::test]
    async fn test_missing_host_method_becomes_fault() {
        let host = Rc::new(MockHost::new());
        let object = MockHost::server().build();
        let adapter = HostCapabilityServer::new(&host, schema(), &object);

        let fault = adapter
            .dispatch(1, context("Bar", json!({})))
            .await
            .unwrap_err();
        assert!(fault.description.starts_with("AttributeError"));
    }
}

#[cfg(test)]
mod lifetime_tests {
    use super::*;

    #[test]
    fn test_server_released_when_adapter_dropped() {
        let host = Rc::new(MockHost::new());
        let object = MockHost::server().build();

        let cap = server_to_client(&host, schema(), &object);
        assert_eq!(host.ref_count(&object), 2);
        drop(cap);
        assert_eq!(host.ref_count(&object), 1);
    }

    #[test]
    fn test_all_entry_points_dispatch_identically() {
        let event_loop = EventLoop::new().unwrap();
        let host = Rc::new(MockHost::new());
        let object = MockHost::server()
            .method("Foo", |ctx| {
                ctx.set_results(json!({"via": ctx.interface()}));
                Ok(None)
            })
            .build();

        let client = new_client(&host, schema(), &object);
        let value = new_server(&host, schema(), &object);
        let cap = server_to_client(&host, schema(), &object);

        let from_client = event_loop.wait(client.call("Foo", json!({}))).unwrap();
        let from_value = event_loop
            .wait(value.into_client().call("Foo", json!({})))
            .unwrap();
        let ctx = context("Foo", json!({}));
        event_loop.wait(cap.dispatch(0, ctx.clone())).unwrap();

        assert_eq!(from_client, json!({"via": "Widget"}));
        assert_eq!(from_value, from_client);
        assert_eq!(ctx.take_results(), from_client);
        assert_eq!(dispatched(&object).len(), 3);
    }

    #[test]
    fn test_cap_table_release_frees_host_object() {
        let host = Rc::new(MockHost::new());
        let object = MockHost::server().build();
        let table = CapTable::new();

        let id = table.export(server_to_client(&host, schema(), &object));
        table.retain(id).unwrap();
        assert_eq!(host.ref_count(&object), 2);

        assert!(!table.release(id).unwrap());
        assert!(table.release(id).unwrap());
        assert_eq!(host.ref_count(&object), 1);
    }
}

#[cfg(test)]
mod bridge_round_trip_tests {
    use super::*;

    #[test]
    fn test_client_response_delivered_to_host_continuation() {
        let event_loop = EventLoop::new().unwrap();
        let host = Rc::new(MockHost::new());
        let bridge = PromiseBridge::new(host.clone());
        let object = MockHost::server()
            .method("Foo", |ctx| {
                let n = ctx.params()["n"].as_i64().unwrap_or(0);
                ctx.set_results(json!({"doubled": n * 2}));
                Ok(None)
            })
            .build();
        let client = new_client(&host, schema(), &object);

        let success = host.callable(|_, arg| Ok(arg.unwrap_or(MockValue::None)));
        let promise = bridge.attach(
            NativePromise::response(client.call("Foo", json!({"n": 21}))),
            &success,
            &MockValue::None,
        );

        let value = bridge.wait(&event_loop, promise).unwrap();
        assert_eq!(value, MockValue::Struct(json!({"doubled": 42})));
        assert_eq!(host.call_count(&success), 1);
        assert_eq!(host.ref_count(&success), 1);
    }

    #[test]
    fn test_server_fault_reaches_host_error_handler_with_identity() {
        let event_loop = EventLoop::new().unwrap();
        let host = Rc::new(MockHost::new());
        let bridge = PromiseBridge::new(host.clone());
        let raised = MockException::new("KeyError", "missing").at("store.py", 3);
        let thrown = raised.clone();
        let object = MockHost::server()
            .method("Foo", move |_| Err(thrown.clone()))
            .build();
        let client = new_client(&host, schema(), &object);

        let success = host.callable(|_, _| Ok(MockValue::Int(0)));
        let error = host.callable(|_, arg| match arg {
            Some(MockValue::Exception(e)) if e.kind == MockHost::FAULT_KIND => {
                Ok(MockValue::Str(e.message))
            }
            other => Err(MockException::new("AssertionError", format!("{:?}", other))),
        });

        let promise = bridge.attach(
            NativePromise::response(client.call("Foo", json!({}))),
            &success,
            &error,
        );
        let value = bridge.wait(&event_loop, promise).unwrap();

        assert_eq!(value, MockValue::Str("KeyError: missing".to_string()));
        assert_eq!(host.call_count(&success), 0);

        let failing = bridge.attach(
            NativePromise::response(client.call("Foo", json!({}))),
            &success,
            &MockValue::None,
        );
        let reraised = bridge.wait(&event_loop, failing).unwrap_err();
        assert_eq!(reraised, raised);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_retain_release_balances(extra in 0usize..8) {
            let host = Rc::new(MockHost::new());
            let object = MockHost::server().build();
            let table = CapTable::new();
            let id = table.export(server_to_client(&host, schema(), &object));

            for _ in 0..extra {
                table.retain(id).unwrap();
            }
            for _ in 0..extra {
                prop_assert!(!table.release(id).unwrap());
            }
            prop_assert_eq!(host.ref_count(&object), 2);
            prop_assert!(table.release(id).unwrap());
            prop_assert_eq!(host.ref_count(&object), 1);
            prop_assert!(table.release(id).is_err());
        }
    }
}
