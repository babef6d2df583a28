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

//! root nursery, accept server, parent connection and the cancellation
//! protocol that ties them together.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use actor_config::endpoint::ActorEndpointConfig;

use crate::channel::{Channel, ChannelSender};
use crate::errors::{ActorError, Result};
use crate::id::{ActorId, CallId};
use crate::invoker::ModuleRegistry;
use crate::message_loop::MessageLoop;
use crate::registry::PeerRegistry;
use crate::rpc_client::{InboxTable, ReplyInbox, RpcClient};
use crate::tasks::TaskRegistry;
use crate::value::Value;
use crate::wire::Frame;

struct ActorInner {
    id: ActorId,
    config: ActorEndpointConfig,
    modules: ModuleRegistry,
    peers: Arc<PeerRegistry>,
    inboxes: InboxTable,
    tasks: TaskRegistry,
    root_cancel: CancellationToken,
    server_cancel: CancellationToken,
    /// channels already established to a given remote actor, reused by
    /// later calls instead of reconnecting.
    outbound: Mutex<HashMap<ActorId, ChannelSender>>,
    parent: Mutex<Option<ChannelSender>>,
}

/// cheap, cloneable handle to a running actor. this is what
/// [`crate::current`] binds as the process/task-local "current actor".
#[derive(Clone)]
pub struct ActorHandle(Arc<ActorInner>);

impl ActorHandle {
    pub fn id(&self) -> &ActorId {
        &self.0.id
    }

    pub fn config(&self) -> &ActorEndpointConfig {
        &self.0.config
    }

    /// open (or reuse) a channel to `addr`/`remote`, returning an
    /// [`RpcClient`] scoped to it.
    pub async fn rpc_client_to(&self, addr: &str) -> Result<RpcClient> {
        let sender = self.connect_and_serve(addr).await?;
        Ok(RpcClient::new(self.0.id.clone(), sender, self.0.inboxes.clone()))
    }

    /// convenience one-shot call: connect if needed, send the request, and
    /// return its inbox. callers interpret the `functype` preamble and
    /// subsequent frames themselves.
    pub async fn call(&self, addr: &str, ns: impl ToString, func: impl ToString, kwargs: Value) -> Result<(CallId, ReplyInbox)> {
        let rpc = self.rpc_client_to(addr).await?;
        rpc.send_cmd(ns, func, kwargs).await
    }

    async fn connect_and_serve(&self, addr: &str) -> Result<ChannelSender> {
        let mut chan = Channel::connect(addr).await?;
        let remote = crate::channel::handshake(&mut chan, &self.0.id).await?;

        if let Some(existing) = self.0.outbound.lock().await.get(&remote) {
            return Ok(existing.clone());
        }

        let (reader, sender) = chan.split();
        self.0.outbound.lock().await.insert(remote.clone(), sender.clone());
        self.spawn_message_loop(reader, sender.clone(), remote);
        Ok(sender)
    }

    fn spawn_message_loop(&self, reader: crate::channel::ChannelReader, sender: ChannelSender, remote: ActorId) {
        let ml = MessageLoop::new(
            reader,
            sender,
            remote,
            self.0.id.clone(),
            self.0.modules.clone(),
            self.0.inboxes.clone(),
            self.0.peers.clone(),
            self.0.root_cancel.clone(),
            self.0.tasks.clone(),
        );
        let this = self.clone();
        tokio::spawn(crate::current::scope(this.clone(), move || async move {
            if let Err(e) = ml.run().await {
                tracing::error!(error = %e, "message loop exited with error, tearing the actor down");
                this.report_to_parent(e.to_string()).await;
                this.cancel().await;
            }
        }));
    }

    /// cancellation protocol (spec order): cancel every rpc task and await
    /// drain, cancel the accept server, then cancel the root scope.
    pub async fn cancel(&self) {
        self.0.tasks.cancel_all().await;
        self.0.tasks.wait_empty().await;
        self.0.server_cancel.cancel();
        self.0.root_cancel.cancel();
    }

    /// suspend until this actor's root scope has been cancelled.
    pub async fn join(&self) {
        self.0.root_cancel.cancelled().await;
    }

    pub fn root_cancel(&self) -> CancellationToken {
        self.0.root_cancel.clone()
    }
}

/// starts an actor: binds its accept server, optionally connects to its
/// parent, registers with the arbiter, and returns a handle. the server
/// and parent-forwarding tasks run in the background; call
/// [`ActorHandle::join`] to block until the actor is cancelled.
pub async fn start(config: ActorEndpointConfig, modules: ModuleRegistry) -> Result<ActorHandle> {
    let id = ActorId::new(config.name.clone());
    let bind_addr = config.bind_addr.to_string();

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| ActorError::BindFailed(bind_addr.clone(), e.to_string()))?;

    let inner = Arc::new(ActorInner {
        id: id.clone(),
        config: config.clone(),
        modules,
        peers: Arc::new(PeerRegistry::new()),
        inboxes: InboxTable::new(),
        tasks: TaskRegistry::new(),
        root_cancel: CancellationToken::new(),
        server_cancel: CancellationToken::new(),
        outbound: Mutex::new(HashMap::new()),
        parent: Mutex::new(None),
    });
    let handle = ActorHandle(inner);

    handle.spawn_accept_loop(listener);

    if let Some(parent_addr) = config.parent_addr.clone() {
        handle.connect_parent(&parent_addr.to_string()).await?;
    }

    register_with_arbiter(&handle).await?;

    tracing::info!(actor = %id, bind = %bind_addr, "actor started");
    Ok(handle)
}

impl ActorHandle {
    fn spawn_accept_loop(&self, listener: TcpListener) {
        let this = self.clone();
        let server_cancel = self.0.server_cancel.clone();
        tokio::spawn(crate::current::scope(this.clone(), move || async move {
            loop {
                tokio::select! {
                    _ = server_cancel.cancelled() => {
                        tracing::debug!("accept server cancelled, refusing new connections");
                        return;
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer_addr)) => {
                                let this = this.clone();
                                tokio::spawn(crate::current::scope(this.clone(), move || async move {
                                    this.accept_one(stream, peer_addr.to_string()).await;
                                }));
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "accept failed");
                            }
                        }
                    }
                }
            }
        }));
    }

    async fn accept_one(&self, stream: tokio::net::TcpStream, peer_addr: String) {
        let mut chan = Channel::new(stream);
        let remote = match crate::channel::handshake(&mut chan, &self.0.id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%peer_addr, error = %e, "rejecting channel, handshake failed");
                return;
            }
        };
        let (reader, sender) = chan.split();
        self.0.outbound.lock().await.insert(remote.clone(), sender.clone());
        self.spawn_message_loop(reader, sender, remote);
    }

    async fn connect_parent(&self, addr: &str) -> Result<()> {
        let mut chan = Channel::connect(addr).await?;
        crate::channel::handshake(&mut chan, &self.0.id).await?;
        let (reader, sender) = chan.split();
        *self.0.parent.lock().await = Some(sender.clone());
        self.spawn_message_loop(reader, sender, ActorId::new("parent"));
        Ok(())
    }

    /// ship an actor-level error to our parent, if we have one. best-effort.
    pub async fn report_to_parent(&self, message: impl ToString) {
        if let Some(sender) = self.0.parent.lock().await.as_ref() {
            let _ = sender.send(Frame::Error { cid: None, message: message.to_string() });
        }
    }
}

async fn register_with_arbiter(handle: &ActorHandle) -> Result<()> {
    let arbiter_addr = handle.0.config.arbiter_addr.to_string();
    if arbiter_addr == handle.0.config.bind_addr.to_string() {
        // we are the arbiter; nothing to register over the wire.
        return Ok(());
    }
    let own_addr = handle.0.config.bind_addr.to_string();
    let kwargs = crate::kwargs! {
        "name" => Value::Str(handle.0.id.name.clone()),
        "uid" => Value::Str(handle.0.id.instance_uid.to_string()),
        "addr" => Value::Str(own_addr),
    };
    let (_cid, inbox) = handle.call(&arbiter_addr, "arbiter", "register_actor", kwargs).await?;
    let _functype = inbox.recv().await?;
    match inbox.recv().await? {
        Frame::Return { .. } => Ok(()),
        Frame::Error { message, .. } => Err(ActorError::other(message)),
        other => Err(ActorError::other(format!("unexpected registration reply {other:?}"))),
    }
}
