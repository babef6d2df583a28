//! standalone arbiter process. run with:
//!     cargo run --example arbiter -- 127.0.0.1:7770

use actor_core::arbiter;
use actor_core::invoker::ModuleRegistry;
use actor_core::lifecycle;
use actor_config::endpoint::{ActorEndpointConfig, HostPort};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let bind = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:7770".to_string());
    let host_port = parse(&bind);

    let registry = arbiter::Registry::new();
    let modules = ModuleRegistry::new().with_module("arbiter", arbiter::module(registry));

    let config = ActorEndpointConfig {
        name: "arbiter".into(),
        bind_addr: host_port.clone(),
        arbiter_addr: host_port,
        parent_addr: None,
        cancel_timeout: std::time::Duration::from_secs(5),
    };

    let handle = lifecycle::start(config, modules).await?;
    println!("arbiter listening on {}", handle.config().bind_addr);
    handle.join().await;
    Ok(())
}

fn parse(addr: &str) -> HostPort {
    let mut parts = addr.rsplitn(2, ':');
    let port: u16 = parts.next().unwrap().parse().expect("invalid port");
    let host = parts.next().unwrap_or("127.0.0.1");
    HostPort::new(host, port)
}
