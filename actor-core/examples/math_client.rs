//! looks the `worker` actor up through the arbiter, then calls `math.add`
//! and streams `math.count_to`. run after `arbiter` and `math_worker`:
//!     cargo run --example math_client -- 127.0.0.1:7772 127.0.0.1:7770

use actor_core::invoker::ModuleRegistry;
use actor_core::lifecycle;
use actor_core::value::Value;
use actor_core::wire::Frame;
use actor_core::{kwargs, ActorError};
use actor_config::endpoint::{ActorEndpointConfig, HostPort};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let bind = args.next().unwrap_or_else(|| "127.0.0.1:7772".to_string());
    let arbiter_addr = args.next().unwrap_or_else(|| "127.0.0.1:7770".to_string());

    let config = ActorEndpointConfig {
        name: "client".into(),
        bind_addr: parse(&bind),
        arbiter_addr: parse(&arbiter_addr),
        parent_addr: None,
        cancel_timeout: std::time::Duration::from_secs(5),
    };

    let handle = lifecycle::start(config, ModuleRegistry::new()).await?;

    let (_cid, lookup_inbox) = handle
        .call(&arbiter_addr, "arbiter", "wait_for_actor", kwargs! { "name" => Value::Str("worker".into()) })
        .await?;
    let _functype = lookup_inbox.recv().await?;
    let worker_addr = match lookup_inbox.recv().await? {
        Frame::Return { value: Value::List(addrs), .. } => match addrs.into_iter().next() {
            Some(Value::Str(addr)) => addr,
            _ => return Err(ActorError::other("arbiter returned no matching worker").into()),
        },
        other => return Err(ActorError::other(format!("unexpected lookup reply {other:?}")).into()),
    };
    println!("found worker at {worker_addr}");

    let (_cid, add_inbox) = handle.call(&worker_addr, "math", "add", kwargs! { "a" => Value::Int(2), "b" => Value::Int(3) }).await?;
    let _functype = add_inbox.recv().await?;
    if let Frame::Return { value, .. } = add_inbox.recv().await? {
        println!("2 + 3 = {value}");
    }

    let (_cid, stream_inbox) = handle.call(&worker_addr, "math", "count_to", kwargs! { "n" => Value::Int(3) }).await?;
    let _functype = stream_inbox.recv().await?;
    loop {
        match stream_inbox.recv().await? {
            Frame::Yield { value, .. } => println!("yield {value}"),
            Frame::Stop { .. } => break,
            other => { println!("unexpected {other:?}"); break; }
        }
    }

    handle.cancel().await;
    Ok(())
}

fn parse(addr: &str) -> HostPort {
    let mut parts = addr.rsplitn(2, ':');
    let port: u16 = parts.next().unwrap().parse().expect("invalid port");
    let host = parts.next().unwrap_or("127.0.0.1");
    HostPort::new(host, port)
}
