//! a worker actor that registers with an arbiter and serves a "math" module.
//! run after `arbiter`:
//!     cargo run --example math_worker -- 127.0.0.1:7771 127.0.0.1:7770

use actor_core::invoker::{FuncDescriptor, ModuleRegistry, RpcModule};
use actor_core::lifecycle;
use actor_core::value::Value;
use actor_config::endpoint::{ActorEndpointConfig, HostPort};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let bind = args.next().unwrap_or_else(|| "127.0.0.1:7771".to_string());
    let arbiter = args.next().unwrap_or_else(|| "127.0.0.1:7770".to_string());

    let math = RpcModule::new()
        .register(FuncDescriptor::value("add", |kwargs| {
            let a = kwargs.get("a").and_then(Value::as_i64).unwrap_or(0);
            let b = kwargs.get("b").and_then(Value::as_i64).unwrap_or(0);
            Ok(Value::Int(a + b))
        }))
        .register(FuncDescriptor::stream("count_to", |kwargs| {
            let n = kwargs.get("n").and_then(Value::as_i64).unwrap_or(0);
            futures::stream::iter((0..n).map(|i| Ok(Value::Int(i))))
        }));

    let modules = ModuleRegistry::new().with_module("math", math);

    let config = ActorEndpointConfig {
        name: "worker".into(),
        bind_addr: parse(&bind),
        arbiter_addr: parse(&arbiter),
        parent_addr: None,
        cancel_timeout: std::time::Duration::from_secs(5),
    };

    let handle = lifecycle::start(config, modules).await?;
    println!("math_worker listening on {}", handle.config().bind_addr);
    handle.join().await;
    Ok(())
}

fn parse(addr: &str) -> HostPort {
    let mut parts = addr.rsplitn(2, ':');
    let port: u16 = parts.next().unwrap().parse().expect("invalid port");
    let host = parts.next().unwrap_or("127.0.0.1");
    HostPort::new(host, port)
}
