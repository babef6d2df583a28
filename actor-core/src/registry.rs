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

//! per-actor table of live channels to remote peers, keyed by remote identity.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

use crate::id::ActorId;

struct PeerEntry {
    /// handles into the message loops owning each live channel to this peer.
    /// the registry does not own the `Channel` itself (that belongs to the
    /// `MessageLoop` task) -- it only tracks which channel ids are live so it
    /// can answer `wait_for_peer` and detect `no_more_peers`.
    channel_tokens: Vec<u64>,
    connected: Arc<Notify>,
}

impl PeerEntry {
    fn new() -> Self {
        PeerEntry { channel_tokens: Vec::new(), connected: Arc::new(Notify::new()) }
    }
}

/// registry of live peer channels for one actor. multiple concurrent channels
/// to the same peer are tolerated; the most-recently-registered one is
/// preferred by [`PeerRegistry::wait_for_peer`].
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<ActorId, PeerEntry>>,
    empty: Arc<Notify>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        PeerRegistry { peers: RwLock::new(HashMap::new()), empty: Arc::new(Notify::new()) }
    }

    /// register a newly handshaken channel, identified by an opaque per-loop
    /// token. fires the peer's readiness event.
    pub async fn register(&self, peer: ActorId, channel_token: u64) {
        let mut peers = self.peers.write().await;
        let entry = peers.entry(peer).or_insert_with(PeerEntry::new);
        if !entry.channel_tokens.is_empty() {
            tracing::warn!("multiple concurrent channels to the same peer");
        }
        entry.channel_tokens.push(channel_token);
        entry.connected.notify_waiters();
    }

    /// suspend until at least one channel to `peer` is registered, then
    /// return. caller still has to look the live channel up elsewhere (e.g.
    /// through whatever keeps the `Channel` handle); by the time this
    /// returns the channel may already have closed again.
    pub async fn wait_for_peer(&self, peer: &ActorId) {
        loop {
            {
                let peers = self.peers.read().await;
                if peers.get(peer).is_some_and(|e| !e.channel_tokens.is_empty()) {
                    return;
                }
            }
            let notified = {
                let mut peers = self.peers.write().await;
                let entry = peers.entry(peer.clone()).or_insert_with(PeerEntry::new);
                entry.connected.clone().notified_owned()
            };
            notified.await;
        }
    }

    /// remove one channel registration for `peer`; drops the whole entry if
    /// it becomes empty, and signals `no_more_peers` if the registry is then
    /// globally empty.
    pub async fn unregister(&self, peer: &ActorId, channel_token: u64) {
        let mut peers = self.peers.write().await;
        if let Some(entry) = peers.get_mut(peer) {
            entry.channel_tokens.retain(|t| *t != channel_token);
            if entry.channel_tokens.is_empty() {
                peers.remove(peer);
            }
        }
        if peers.is_empty() {
            self.empty.notify_waiters();
        }
    }

    pub async fn no_more_peers(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// suspend until [`PeerRegistry::no_more_peers`] holds.
    pub async fn wait_no_more_peers(&self) {
        loop {
            let notified = self.empty.notified();
            if self.no_more_peers().await {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_more_peers_tracks_emptiness() {
        let reg = PeerRegistry::new();
        assert!(reg.no_more_peers().await);

        let peer = ActorId::new("worker");
        reg.register(peer.clone(), 1).await;
        assert!(!reg.no_more_peers().await);

        reg.unregister(&peer, 1).await;
        assert!(reg.no_more_peers().await);
    }

    #[tokio::test]
    async fn wait_for_peer_returns_once_registered() {
        let reg = Arc::new(PeerRegistry::new());
        let peer = ActorId::new("worker");

        let waiter_reg = reg.clone();
        let waiter_peer = peer.clone();
        let waiter = tokio::spawn(async move {
            waiter_reg.wait_for_peer(&waiter_peer).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        reg.register(peer, 7).await;

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }
}
