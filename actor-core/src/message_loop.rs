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

//! owns one channel for its lifetime: routes incoming replies to local
//! reply inboxes and dispatches incoming requests to the [`crate::invoker`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelReader, ChannelSender};
use crate::errors::Result;
use crate::id::{ActorId, CallId};
use crate::invoker::{self, ModuleRegistry};
use crate::registry::PeerRegistry;
use crate::rpc_client::InboxTable;
use crate::tasks::TaskRegistry;
use crate::wire::Frame;

static NEXT_CHANNEL_TOKEN: AtomicU64 = AtomicU64::new(1);

/// one channel's read loop and dispatch logic. lives for the lifetime of the
/// channel; on exit it tears the channel's registry entry down.
pub struct MessageLoop {
    reader: ChannelReader,
    sender: ChannelSender,
    remote_uid: ActorId,
    own_id: ActorId,
    modules: ModuleRegistry,
    inboxes: InboxTable,
    peers: Arc<PeerRegistry>,
    root_cancel: CancellationToken,
    channel_token: u64,
    tasks: TaskRegistry,
}

impl MessageLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: ChannelReader,
        sender: ChannelSender,
        remote_uid: ActorId,
        own_id: ActorId,
        modules: ModuleRegistry,
        inboxes: InboxTable,
        peers: Arc<PeerRegistry>,
        root_cancel: CancellationToken,
        tasks: TaskRegistry,
    ) -> Self {
        let channel_token = NEXT_CHANNEL_TOKEN.fetch_add(1, Ordering::Relaxed);
        MessageLoop {
            reader,
            sender,
            remote_uid,
            own_id,
            modules,
            inboxes,
            peers,
            root_cancel,
            channel_token,
            tasks,
        }
    }

    /// dropping the last `ChannelSender` clone closes the writer task's
    /// sink, which the peer observes as `recv() -> None` -- the implicit
    /// terminator. no explicit terminator frame is needed over TCP.
    pub async fn run(mut self) -> Result<()> {
        self.peers.register(self.remote_uid.clone(), self.channel_token).await;

        let outcome = self.drive().await;

        self.tasks.cancel_channel(self.channel_token).await;
        self.peers.unregister(&self.remote_uid, self.channel_token).await;
        outcome
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            let frame = match self.reader.recv().await? {
                Some(f) => f,
                None => {
                    tracing::debug!(peer = %self.remote_uid, "terminator received, tearing down channel");
                    self.tasks.cancel_channel(self.channel_token).await;
                    return Ok(());
                }
            };

            match frame {
                Frame::Return { cid, .. } | Frame::Yield { cid, .. } | Frame::Stop { cid } | Frame::FuncType { cid, .. } => {
                    self.inboxes.route(cid, frame).await;
                }
                Frame::Error { cid: Some(cid), message } => {
                    self.inboxes.route(cid, Frame::Error { cid: Some(cid), message }).await;
                }
                Frame::Error { cid: None, message } => {
                    tracing::warn!(peer = %self.remote_uid, %message, "actor-level error from peer");
                    self.inboxes.broadcast_error(&message).await;
                    return Err(crate::errors::ActorError::PeerError(self.remote_uid.clone(), message));
                }
                Frame::Cmd { ns, func, kwargs, caller, cid } => {
                    self.dispatch(ns, func, kwargs, caller, cid).await;
                }
                Frame::Hello(_) => {
                    tracing::warn!("unexpected Hello frame after handshake, ignoring");
                }
            }
        }
    }

    async fn dispatch(&mut self, ns: String, func: String, kwargs: crate::value::Value, caller: ActorId, cid: CallId) {
        let desc = match self.modules.resolve(&ns, &func) {
            Ok(d) => d.clone(),
            Err(e) => {
                let _ = self.sender.send(Frame::Error { cid: Some(cid), message: e.to_string() });
                return;
            }
        };

        tracing::debug!(%ns, %func, %caller, ?cid, "dispatching invocation");

        // the actor's own cancel operation is never itself published into the
        // rpc-task list: cancelling a cancel would deadlock the teardown
        // protocol, and it is not a long-lived invocation anyway.
        let non_cancellable = ns == "self" && func == "cancel";
        let sender = self.sender.clone();

        if non_cancellable {
            tokio::spawn(async move {
                invoker::invoke(desc, kwargs, cid, sender, CancellationToken::new()).await;
            });
            return;
        }

        let token = self.tasks.start(cid, self.channel_token, &self.root_cancel).await;
        let tasks = self.tasks.clone();

        tokio::spawn(async move {
            invoker::invoke(desc, kwargs, cid, sender, token).await;
            tasks.finish(&cid).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::invoker::{FuncDescriptor, RpcModule};
    use crate::value::Value;
    use tokio::net::TcpListener;

    fn echo_modules() -> ModuleRegistry {
        let module = RpcModule::new().register(FuncDescriptor::value("echo", |v| Ok(v)));
        ModuleRegistry::new().with_module("test", module)
    }

    #[tokio::test]
    async fn dispatches_request_and_replies_through_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_id = ActorId::new("server");
        let client_id = ActorId::new("client");

        let server_id_clone = server_id.clone();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut chan = Channel::new(stream);
            let remote = crate::channel::handshake(&mut chan, &server_id_clone).await.unwrap();
            let (reader, sender) = chan.split();
            let peers = Arc::new(PeerRegistry::new());
            let inboxes = InboxTable::new();
            let ml = MessageLoop::new(
                reader, sender, remote, server_id_clone, echo_modules(), inboxes, peers,
                CancellationToken::new(), crate::tasks::TaskRegistry::new(),
            );
            ml.run().await
        });

        let mut client_chan = Channel::connect(&addr.to_string()).await.unwrap();
        crate::channel::handshake(&mut client_chan, &client_id).await.unwrap();
        let (mut reader, sender) = client_chan.split();
        let inboxes = InboxTable::new();
        let rpc = crate::rpc_client::RpcClient::new(client_id.clone(), sender.clone(), inboxes.clone());

        let (cid, inbox) = rpc.send_cmd("test", "echo", Value::Str("hi".into())).await.unwrap();

        // client side needs its own tiny reply-routing loop since the full
        // MessageLoop is exercised on the server side in this test.
        let routing = tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(Some(frame)) => {
                        if let Some(fcid) = frame.cid() {
                            inboxes.route(fcid, frame).await;
                        }
                    }
                    _ => break,
                }
            }
        });

        let _functype = inbox.recv().await.unwrap();
        let reply = inbox.recv().await.unwrap();
        match reply {
            Frame::Return { value, cid: got_cid } => {
                assert_eq!(got_cid, cid);
                assert_eq!(value.as_str(), Some("hi"));
            }
            other => panic!("unexpected frame {other:?}"),
        }

        routing.abort();
        server.abort();
    }
}
