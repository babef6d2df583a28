/*
 * Copyright (c) 2024, United States Government, as represented by the
 * Administrator of the National Aeronautics and Space Administration.
 * All rights reserved.
 *
 * The RACE - Runtime for Airspace Concept Evaluation platform is licensed
 * under the Apache License, Version 2.0 (the "License"); you may not use
 * this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! the arbiter: a central `name -> address` registry with wait-for-actor
//! semantics, exposed as an ordinary `"arbiter"` [`crate::invoker::RpcModule`]
//! so any actor can host it.
//!
//! `wait_for_actor` checks the registry for an existing match *before*
//! installing a waiter, under the registry's single lock -- this closes the
//! class of bug where a waiter list could race against a concurrent
//! registration for the same name.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

use crate::errors::{ActorError, Result};
use crate::invoker::{FuncDescriptor, RpcModule};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisteredActor {
    pub name: String,
    pub uid: String,
}

struct RegistryInner {
    /// `name -> (uid, address)`, latest registration per uid kept; several
    /// uids may share a name (e.g. multiple workers).
    actors: HashMap<RegisteredActor, String>,
    /// pending `wait_for_actor(name)` events; a list of plain event senders,
    /// never uids, so there is no mixing of the two.
    waiters: HashMap<String, Vec<oneshot::Sender<Vec<String>>>>,
}

/// the arbiter's registry. cheaply cloneable; methods take `&self` and lock
/// internally so it can be shared between the RPC module closures and the
/// in-process [`Registry::local_handle`] shortcut.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { inner: Arc::new(Mutex::new(RegistryInner { actors: HashMap::new(), waiters: HashMap::new() })) }
    }

    pub async fn register_actor(&self, name: impl ToString, uid: impl ToString, addr: impl ToString) {
        let name = name.to_string();
        let addr = addr.to_string();
        let key = RegisteredActor { name: name.clone(), uid: uid.to_string() };

        let mut inner = self.inner.lock().await;
        inner.actors.insert(key, addr);

        if let Some(waiters) = inner.waiters.remove(&name) {
            let addrs: Vec<String> = inner.actors.iter().filter(|(k, _)| k.name == name).map(|(_, a)| a.clone()).collect();
            for tx in waiters {
                let _ = tx.send(addrs.clone());
            }
        }
    }

    pub async fn unregister_actor(&self, name: impl ToString, uid: impl ToString) {
        let key = RegisteredActor { name: name.to_string(), uid: uid.to_string() };
        self.inner.lock().await.actors.remove(&key);
    }

    pub async fn find_actor(&self, name: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.actors.iter().find(|(k, _)| k.name == name).map(|(_, addr)| addr.clone())
    }

    /// returns every address currently registered under `name` if at least
    /// one is already registered; otherwise installs a waiter and suspends
    /// until the next registration under that name, then returns every
    /// matching address as of that registration. the existence check and
    /// the waiter installation happen under one lock acquisition, so a
    /// registration cannot land in the gap between them.
    pub async fn wait_for_actor(&self, name: &str) -> Vec<String> {
        let rx = {
            let mut inner = self.inner.lock().await;
            let addrs: Vec<String> = inner.actors.iter().filter(|(k, _)| k.name == name).map(|(_, a)| a.clone()).collect();
            if !addrs.is_empty() {
                return addrs;
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.entry(name.to_string()).or_default().push(tx);
            rx
        };
        rx.await.unwrap_or_default()
    }

    /// an in-process handle that bypasses the TCP loopback round-trip when
    /// the caller is itself the process hosting this registry.
    pub fn local_handle(&self) -> Self {
        self.clone()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// builds the `"arbiter"` RPC module backed by `registry`, for inclusion in
/// an actor's [`crate::invoker::ModuleRegistry`] under the `"arbiter"`
/// namespace.
pub fn module(registry: Registry) -> RpcModule {
    let reg = registry.clone();
    let register = FuncDescriptor::async_value("register_actor", move |kwargs| {
        let reg = reg.clone();
        async move {
            let name = kwargs.get("name").and_then(Value::as_str).ok_or_else(|| ActorError::other("missing name"))?.to_string();
            let uid = kwargs.get("uid").and_then(Value::as_str).ok_or_else(|| ActorError::other("missing uid"))?.to_string();
            let addr = kwargs.get("addr").and_then(Value::as_str).ok_or_else(|| ActorError::other("missing addr"))?.to_string();
            reg.register_actor(name, uid, addr).await;
            Ok(Value::Null)
        }
    });

    let reg = registry.clone();
    let unregister = FuncDescriptor::async_value("unregister_actor", move |kwargs| {
        let reg = reg.clone();
        async move {
            let name = kwargs.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let uid = kwargs.get("uid").and_then(Value::as_str).unwrap_or_default().to_string();
            reg.unregister_actor(name, uid).await;
            Ok(Value::Null)
        }
    });

    let reg = registry.clone();
    let find = FuncDescriptor::async_value("find_actor", move |kwargs| {
        let reg = reg.clone();
        async move {
            let name = kwargs.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            Ok(match reg.find_actor(&name).await {
                Some(addr) => Value::Str(addr),
                None => Value::Null,
            })
        }
    });

    let reg = registry.clone();
    let wait = FuncDescriptor::async_value("wait_for_actor", move |kwargs| {
        let reg = reg.clone();
        async move {
            let name = kwargs.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let addrs = reg.wait_for_actor(&name).await.into_iter().map(Value::Str).collect();
            Ok(Value::List(addrs))
        }
    });

    RpcModule::new().register(register).register(unregister).register(find).register(wait)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_actor_returns_none_when_absent() {
        let reg = Registry::new();
        assert_eq!(reg.find_actor("nobody").await, None);
    }

    #[tokio::test]
    async fn register_then_find_round_trips() {
        let reg = Registry::new();
        reg.register_actor("worker", "u1", "127.0.0.1:1").await;
        assert_eq!(reg.find_actor("worker").await, Some("127.0.0.1:1".to_string()));
    }

    #[tokio::test]
    async fn unregister_unknown_is_a_no_op() {
        let reg = Registry::new();
        reg.unregister_actor("nobody", "u0").await; // must not panic
        assert_eq!(reg.find_actor("nobody").await, None);
    }

    #[tokio::test]
    async fn register_twice_keeps_latest_for_same_uid() {
        let reg = Registry::new();
        reg.register_actor("worker", "u1", "127.0.0.1:1").await;
        reg.register_actor("worker", "u1", "127.0.0.1:2").await;
        assert_eq!(reg.find_actor("worker").await, Some("127.0.0.1:2".to_string()));
    }

    #[tokio::test]
    async fn find_after_unregister_returns_remaining_uid() {
        let reg = Registry::new();
        reg.register_actor("worker", "u1", "127.0.0.1:1").await;
        reg.register_actor("worker", "u2", "127.0.0.1:2").await;
        reg.unregister_actor("worker", "u1").await;
        assert_eq!(reg.find_actor("worker").await, Some("127.0.0.1:2".to_string()));
    }

    #[tokio::test]
    async fn wait_for_actor_returns_immediately_if_already_registered() {
        let reg = Registry::new();
        reg.register_actor("worker", "u1", "127.0.0.1:1").await;
        let addrs = tokio::time::timeout(std::time::Duration::from_millis(100), reg.wait_for_actor("worker"))
            .await
            .unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:1".to_string()]);
    }

    #[tokio::test]
    async fn wait_for_actor_suspends_until_registration() {
        let reg = Registry::new();
        let waiter_reg = reg.clone();
        let waiter = tokio::spawn(async move { waiter_reg.wait_for_actor("worker").await });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        reg.register_actor("worker", "u1", "127.0.0.1:9").await;

        let addrs = tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:9".to_string()]);
    }

    #[tokio::test]
    async fn wait_for_actor_returns_every_address_registered_under_that_name() {
        let reg = Registry::new();
        reg.register_actor("worker", "u1", "127.0.0.1:1").await;
        reg.register_actor("worker", "u2", "127.0.0.1:2").await;
        let mut addrs = tokio::time::timeout(std::time::Duration::from_millis(100), reg.wait_for_actor("worker"))
            .await
            .unwrap();
        addrs.sort();
        assert_eq!(addrs, vec!["127.0.0.1:1".to_string(), "127.0.0.1:2".to_string()]);
    }
}
