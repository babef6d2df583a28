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

//! actor-wide registry of in-flight [`crate::invoker`] tasks, keyed by
//! [`CallId`] across every channel the actor has open. `CallId`s are unique
//! per invocation (invariant: a `CallId` is live in at most one responder's
//! task list at a time), so a flat map is enough to answer both
//! per-channel teardown ("cancel every task on this channel") and the
//! actor-wide `no_more_rpc_tasks` invariant.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::id::CallId;

#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<CallId, (u64, CancellationToken)>>>,
    empty: Arc<Notify>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry { tasks: Arc::new(Mutex::new(HashMap::new())), empty: Arc::new(Notify::new()) }
    }

    /// register a new task on `channel_token`'s channel, derived from
    /// `parent` so the actor's root cancellation reaches it too.
    pub async fn start(&self, cid: CallId, channel_token: u64, parent: &CancellationToken) -> CancellationToken {
        let token = parent.child_token();
        self.tasks.lock().await.insert(cid, (channel_token, token.clone()));
        token
    }

    pub async fn finish(&self, cid: &CallId) {
        let mut tasks = self.tasks.lock().await;
        tasks.remove(cid);
        if tasks.is_empty() {
            self.empty.notify_waiters();
        }
    }

    /// cancel every task belonging to one channel (on that channel's
    /// teardown or its peer's terminator).
    pub async fn cancel_channel(&self, channel_token: u64) {
        let tasks = self.tasks.lock().await;
        for (token_owner, token) in tasks.values() {
            if *token_owner == channel_token {
                token.cancel();
            }
        }
    }

    /// cancel every task across every channel (actor-wide `cancel()`).
    pub async fn cancel_all(&self) {
        let tasks = self.tasks.lock().await;
        for (_, token) in tasks.values() {
            token.cancel();
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// suspend until [`TaskRegistry::is_empty`] holds.
    pub async fn wait_empty(&self) {
        loop {
            let notified = self.empty.notified();
            if self.is_empty().await {
                return;
            }
            notified.await;
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_channel_only_cancels_its_own_tasks() {
        let reg = TaskRegistry::new();
        let root = CancellationToken::new();
        let cid_a = CallId::new();
        let cid_b = CallId::new();

        let token_a = reg.start(cid_a, 1, &root).await;
        let token_b = reg.start(cid_b, 2, &root).await;

        reg.cancel_channel(1).await;

        assert!(token_a.is_cancelled());
        assert!(!token_b.is_cancelled());
    }

    #[tokio::test]
    async fn empty_after_every_task_finishes() {
        let reg = TaskRegistry::new();
        let root = CancellationToken::new();
        let cid = CallId::new();
        reg.start(cid, 1, &root).await;
        assert!(!reg.is_empty().await);
        reg.finish(&cid).await;
        assert!(reg.is_empty().await);
    }
}
