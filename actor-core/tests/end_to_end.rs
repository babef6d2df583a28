//! full-stack scenarios driving real TCP listeners on `127.0.0.1:0`: an
//! arbiter process, a worker that registers with it, and a client that
//! discovers the worker through `wait_for_actor` before calling it.

use actor_core::arbiter;
use actor_core::invoker::{FuncDescriptor, ModuleRegistry, RpcModule};
use actor_core::kwargs;
use actor_core::lifecycle;
use actor_core::value::Value;
use actor_core::wire::{Frame, FuncType};
use actor_config::endpoint::{ActorEndpointConfig, HostPort};
use std::time::Duration;
use tokio::net::TcpListener;

async fn ephemeral_addr() -> HostPort {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    HostPort::new("127.0.0.1", addr.port())
}

fn config(name: &str, bind: HostPort, arbiter_addr: HostPort) -> ActorEndpointConfig {
    ActorEndpointConfig { name: name.into(), bind_addr: bind, arbiter_addr, parent_addr: None, cancel_timeout: Duration::from_secs(5) }
}

async fn start_arbiter() -> (lifecycle::ActorHandle, HostPort) {
    let addr = ephemeral_addr().await;
    let registry = arbiter::Registry::new();
    let modules = ModuleRegistry::new().with_module("arbiter", arbiter::module(registry));
    let handle = lifecycle::start(config("arbiter", addr.clone(), addr.clone()), modules).await.unwrap();
    (handle, addr)
}

fn math_module() -> RpcModule {
    RpcModule::new()
        .register(FuncDescriptor::value("add", |kwargs| {
            let a = kwargs.get("a").and_then(Value::as_i64).unwrap_or(0);
            let b = kwargs.get("b").and_then(Value::as_i64).unwrap_or(0);
            Ok(Value::Int(a + b))
        }))
        .register(FuncDescriptor::value("boom", |_| Err(actor_core::ActorError::other("kaboom"))))
        .register(FuncDescriptor::stream("count_to", |kwargs| {
            let n = kwargs.get("n").and_then(Value::as_i64).unwrap_or(0);
            futures::stream::iter((0..n).map(|i| Ok(Value::Int(i))))
        }))
}

#[tokio::test]
async fn add_round_trip_through_arbiter_discovery() {
    let (arbiter_handle, arbiter_addr) = start_arbiter().await;

    let worker_addr = ephemeral_addr().await;
    let modules = ModuleRegistry::new().with_module("math", math_module());
    let worker = lifecycle::start(config("worker", worker_addr.clone(), arbiter_addr.clone()), modules).await.unwrap();

    let client_addr = ephemeral_addr().await;
    let client = lifecycle::start(config("client", client_addr, arbiter_addr.clone()), ModuleRegistry::new()).await.unwrap();

    let (_cid, lookup) = client
        .call(&arbiter_addr.to_string(), "arbiter", "wait_for_actor", kwargs! { "name" => Value::Str("worker".into()) })
        .await
        .unwrap();
    assert!(matches!(lookup.recv().await.unwrap(), Frame::FuncType { functype: FuncType::AsyncFunction, .. }));
    let found_addr = match lookup.recv().await.unwrap() {
        Frame::Return { value: Value::List(addrs), .. } => match addrs.as_slice() {
            [Value::Str(addr)] => addr.clone(),
            other => panic!("unexpected lookup result {other:?}"),
        },
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(found_addr, worker_addr.to_string());

    let (cid, inbox) = client.call(&found_addr, "math", "add", kwargs! { "a" => Value::Int(2), "b" => Value::Int(3) }).await.unwrap();
    assert!(matches!(inbox.recv().await.unwrap(), Frame::FuncType { functype: FuncType::Function, .. }));
    match inbox.recv().await.unwrap() {
        Frame::Return { value, cid: got_cid } => {
            assert_eq!(got_cid, cid);
            assert_eq!(value.as_i64(), Some(5));
        }
        other => panic!("unexpected {other:?}"),
    }

    client.cancel().await;
    worker.cancel().await;
    arbiter_handle.cancel().await;
}

#[tokio::test]
async fn streaming_count_to_yields_then_stops() {
    let worker_addr = ephemeral_addr().await;
    let modules = ModuleRegistry::new().with_module("math", math_module());
    let own_arbiter = worker_addr.clone();
    let worker = lifecycle::start(config("worker", worker_addr.clone(), own_arbiter), modules).await.unwrap();

    let client_addr = ephemeral_addr().await;
    let client = lifecycle::start(config("client", client_addr.clone(), client_addr), ModuleRegistry::new()).await.unwrap();

    let (_cid, inbox) = client.call(&worker_addr.to_string(), "math", "count_to", kwargs! { "n" => Value::Int(3) }).await.unwrap();
    assert!(matches!(inbox.recv().await.unwrap(), Frame::FuncType { functype: FuncType::AsyncGen, .. }));
    for expected in 0..3i64 {
        match inbox.recv().await.unwrap() {
            Frame::Yield { value, .. } => assert_eq!(value.as_i64(), Some(expected)),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(matches!(inbox.recv().await.unwrap(), Frame::Stop { .. }));

    client.cancel().await;
    worker.cancel().await;
}

#[tokio::test]
async fn function_error_is_delivered_as_terminal_error_frame() {
    let worker_addr = ephemeral_addr().await;
    let modules = ModuleRegistry::new().with_module("math", math_module());
    let own_arbiter = worker_addr.clone();
    let worker = lifecycle::start(config("worker", worker_addr.clone(), own_arbiter), modules).await.unwrap();

    let client_addr = ephemeral_addr().await;
    let client = lifecycle::start(config("client", client_addr.clone(), client_addr), ModuleRegistry::new()).await.unwrap();

    let (cid, inbox) = client.call(&worker_addr.to_string(), "math", "boom", Value::Null).await.unwrap();
    let _functype = inbox.recv().await.unwrap();
    match inbox.recv().await.unwrap() {
        Frame::Error { cid: Some(got_cid), message } => {
            assert_eq!(got_cid, cid);
            assert!(message.contains("kaboom"));
        }
        other => panic!("unexpected {other:?}"),
    }

    client.cancel().await;
    worker.cancel().await;
}

#[tokio::test]
async fn unknown_namespace_reports_an_error_without_killing_the_worker() {
    let worker_addr = ephemeral_addr().await;
    let modules = ModuleRegistry::new().with_module("math", math_module());
    let own_arbiter = worker_addr.clone();
    let worker = lifecycle::start(config("worker", worker_addr.clone(), own_arbiter), modules).await.unwrap();

    let client_addr = ephemeral_addr().await;
    let client = lifecycle::start(config("client", client_addr.clone(), client_addr), ModuleRegistry::new()).await.unwrap();

    let (_cid, bad_inbox) = client.call(&worker_addr.to_string(), "nope", "nope", Value::Null).await.unwrap();
    match bad_inbox.recv().await.unwrap() {
        Frame::Error { message, .. } => assert!(message.contains("nope")),
        other => panic!("unexpected {other:?}"),
    }

    // the worker must still answer a subsequent, valid call.
    let (_cid, ok_inbox) = client.call(&worker_addr.to_string(), "math", "add", kwargs! { "a" => Value::Int(1), "b" => Value::Int(1) }).await.unwrap();
    let _functype = ok_inbox.recv().await.unwrap();
    match ok_inbox.recv().await.unwrap() {
        Frame::Return { value, .. } => assert_eq!(value.as_i64(), Some(2)),
        other => panic!("unexpected {other:?}"),
    }

    client.cancel().await;
    worker.cancel().await;
}

#[tokio::test]
async fn cancel_drains_rpc_tasks_before_returning() {
    let worker_addr = ephemeral_addr().await;
    let modules = ModuleRegistry::new().with_module("math", math_module());
    let own_arbiter = worker_addr.clone();
    let worker = lifecycle::start(config("worker", worker_addr.clone(), own_arbiter), modules).await.unwrap();

    let client_addr = ephemeral_addr().await;
    let client = lifecycle::start(config("client", client_addr.clone(), client_addr), ModuleRegistry::new()).await.unwrap();

    let (_cid, inbox) = client.call(&worker_addr.to_string(), "math", "add", kwargs! { "a" => Value::Int(1), "b" => Value::Int(1) }).await.unwrap();
    let _functype = inbox.recv().await.unwrap();
    let _reply = inbox.recv().await.unwrap();

    // by now the worker's invocation task has already finished on its own;
    // cancel() must still return promptly with nothing left in flight.
    tokio::time::timeout(Duration::from_secs(2), worker.cancel()).await.unwrap();

    client.cancel().await;
}
