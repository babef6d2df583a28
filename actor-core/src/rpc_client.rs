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

//! originates RPC calls: allocates a [`CallId`], writes the request frame,
//! and hands the caller a bounded inbox that the owning
//! [`crate::message_loop::MessageLoop`] will fill with replies.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::channel::ChannelSender;
use crate::errors::{ActorError, Result};
use crate::id::{ActorId, CallId};
use crate::value::Value;
use crate::wire::Frame;

/// capacity of a single call's reply inbox. this is the system's only
/// backpressure point: a slow caller stalls the responder's message loop on
/// that one channel, nothing else.
pub const REPLY_INBOX_CAPACITY: usize = 1000;

pub struct ReplyInbox {
    rx: kanal::AsyncReceiver<Frame>,
}

impl ReplyInbox {
    pub async fn recv(&self) -> Result<Frame> {
        self.rx.recv().await.map_err(|_| ActorError::InboxClosed(CallId::new()))
    }
}

pub struct ReplyInboxSender {
    tx: kanal::AsyncSender<Frame>,
}

impl ReplyInboxSender {
    /// push a reply in; never blocks indefinitely on a sane bounded
    /// capacity, but does apply real backpressure to the message loop that
    /// owns this channel if the caller stops draining.
    pub async fn push(&self, frame: Frame) -> Result<()> {
        self.tx.send(frame).await.map_err(|_| ActorError::ChannelClosed)
    }
}

fn new_inbox() -> (ReplyInboxSender, ReplyInbox) {
    let (tx, rx) = kanal::bounded_async(REPLY_INBOX_CAPACITY);
    (ReplyInboxSender { tx }, ReplyInbox { rx })
}

/// per-peer table of reply inboxes, keyed by [`CallId`]. shared between the
/// [`RpcClient`] (which creates entries before sending) and the
/// [`crate::message_loop::MessageLoop`] (which creates entries lazily for
/// replies that race ahead, and which routes every incoming reply here).
#[derive(Clone, Default)]
pub struct InboxTable {
    inboxes: Arc<Mutex<HashMap<CallId, ReplyInboxSender>>>,
}

impl InboxTable {
    pub fn new() -> Self {
        InboxTable { inboxes: Arc::new(Mutex::new(HashMap::new())) }
    }

    async fn allocate(&self, cid: CallId) -> ReplyInbox {
        let (sender, inbox) = new_inbox();
        self.inboxes.lock().await.insert(cid, sender);
        inbox
    }

    /// route one incoming reply frame to its inbox, creating the inbox if a
    /// reply raced ahead of the caller's own allocation (should not happen
    /// with [`RpcClient::send_cmd`], but is tolerated for robustness).
    pub async fn route(&self, cid: CallId, frame: Frame) {
        let sender = {
            let mut inboxes = self.inboxes.lock().await;
            inboxes.entry(cid).or_insert_with(|| {
                let (sender, _inbox) = new_inbox();
                sender
            }).clone_sender()
        };
        if sender.push(frame).await.is_err() {
            tracing::warn!(?cid, "dropping reply for a call whose inbox was already closed");
        }
    }

    pub async fn drop_call(&self, cid: &CallId) {
        self.inboxes.lock().await.remove(cid);
    }

    /// broadcast an actor-level error (no cid) into every inbox tied to a
    /// peer that just errored out, so every in-flight caller observes it.
    pub async fn broadcast_error(&self, message: &str) {
        let inboxes = self.inboxes.lock().await;
        for sender in inboxes.values() {
            let _ = sender.push(Frame::Error { cid: None, message: message.to_string() }).await;
        }
    }
}

impl ReplyInboxSender {
    fn clone_sender(&self) -> Self {
        ReplyInboxSender { tx: self.tx.clone() }
    }
}

/// originates calls over one channel.
pub struct RpcClient {
    own_id: ActorId,
    sender: ChannelSender,
    inboxes: InboxTable,
}

impl RpcClient {
    pub fn new(own_id: ActorId, sender: ChannelSender, inboxes: InboxTable) -> Self {
        RpcClient { own_id, sender, inboxes }
    }

    /// allocate a call id and inbox, send the request, and return both to
    /// the caller. the inbox exists before the request is sent so a reply
    /// racing ahead of the caller's first `recv` is never lost.
    pub async fn send_cmd(&self, ns: impl ToString, func: impl ToString, kwargs: Value) -> Result<(CallId, ReplyInbox)> {
        let cid = CallId::new();
        let inbox = self.inboxes.allocate(cid).await;
        self.sender.send(Frame::Cmd {
            ns: ns.to_string(),
            func: func.to_string(),
            kwargs,
            caller: self.own_id.clone(),
            cid,
        })?;
        Ok((cid, inbox))
    }
}
