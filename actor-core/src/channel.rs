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

//! bidirectional, ordered, reliable message pipe between two actors. the
//! default backing is a TCP stream framed with a length-delimited codec and
//! `bincode`-encoded [`Frame`]s; nothing above this module depends on that
//! choice of transport or codec.
//!
//! a channel is split internally into a read half, driven by the owning
//! [`crate::message_loop::MessageLoop`], and a cheaply-cloneable
//! [`ChannelSender`] that invocation tasks use to write reply frames back
//! concurrently with the loop's own reads.

use bytes::{Bytes, BytesMut};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::errors::{ActorError, Result};
use crate::id::ActorId;
use crate::wire::Frame;

type Io = Framed<TcpStream, LengthDelimitedCodec>;

/// cloneable write handle into one channel's outbound half. sends are
/// queued to a dedicated writer task, so this never blocks on network I/O --
/// matching the spec's intent that the only backpressure in the system is
/// the per-call reply inbox, not the channel itself.
#[derive(Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<Frame>,
}

impl ChannelSender {
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.tx.send(frame).map_err(|_| ActorError::ChannelClosed)
    }

    #[cfg(test)]
    pub(crate) fn from_raw(tx: mpsc::UnboundedSender<Frame>) -> Self {
        ChannelSender { tx }
    }
}

/// read half of a channel, owned by the task driving its message loop.
pub struct ChannelReader {
    stream: SplitStream<Io>,
}

impl ChannelReader {
    /// `None` means the peer closed the underlying connection (implicit
    /// terminator, equivalent to receiving an explicit terminator frame).
    pub async fn recv(&mut self) -> Result<Option<Frame>> {
        match self.stream.next().await {
            Some(Ok(buf)) => Ok(Some(decode(&buf)?)),
            Some(Err(e)) => Err(ActorError::IOError(e)),
            None => Ok(None),
        }
    }
}

/// a freshly accepted or connected channel, before it has been split for
/// concurrent use. handshake runs on this combined form.
pub struct Channel {
    io: Io,
    pub remote_uid: Option<ActorId>,
    peer_addr: String,
}

impl Channel {
    pub fn new(stream: TcpStream) -> Self {
        let peer_addr = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "?".into());
        let io = Framed::new(stream, LengthDelimitedCodec::new());
        Channel { io, remote_uid: None, peer_addr }
    }

    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ActorError::ConnectFailed(addr.to_string(), e.to_string()))?;
        Ok(Channel::new(stream))
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        let bytes = bincode::serialize(frame)?;
        self.io.send(Bytes::from(bytes)).await.map_err(|_| ActorError::ChannelClosed)
    }

    /// `None` means the peer closed the underlying connection.
    pub async fn recv(&mut self) -> Result<Option<Frame>> {
        match self.io.next().await {
            Some(Ok(buf)) => Ok(Some(decode(&buf)?)),
            Some(Err(e)) => Err(ActorError::IOError(e)),
            None => Ok(None),
        }
    }

    pub fn connected(&self) -> bool {
        self.remote_uid.is_some()
    }

    /// split into a reader (for the message loop) and a cloneable sender
    /// (handed to invocation tasks), spawning the writer task that owns the
    /// sink half. the writer task exits, closing the sink, once every
    /// [`ChannelSender`] clone has been dropped.
    pub fn split(self) -> (ChannelReader, ChannelSender) {
        let (sink, stream): (SplitSink<Io, Bytes>, SplitStream<Io>) = self.io.split();
        let (tx, rx) = mpsc::unbounded_channel::<Frame>();
        tokio::spawn(run_writer(sink, rx));
        (ChannelReader { stream }, ChannelSender { tx })
    }
}

async fn run_writer(mut sink: SplitSink<Io, Bytes>, mut rx: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        let bytes = match bincode::serialize(&frame) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode outbound frame");
                continue;
            }
        };
        if sink.send(Bytes::from(bytes)).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

fn decode(buf: &BytesMut) -> Result<Frame> {
    bincode::deserialize(buf).map_err(ActorError::EncodeError)
}

/// symmetric identity exchange: send our id first, then await the peer's.
/// if the peer closes before sending an id the channel is rejected.
pub async fn handshake(chan: &mut Channel, own_id: &ActorId) -> Result<ActorId> {
    chan.send(&Frame::Hello(own_id.clone())).await?;
    match chan.recv().await? {
        Some(Frame::Hello(remote_id)) => {
            chan.remote_uid = Some(remote_id.clone());
            Ok(remote_id)
        }
        Some(other) => Err(ActorError::HandshakeFailed(format!("expected Hello, got {other:?}"))),
        None => Err(ActorError::HandshakeFailed("peer closed before handshake".into())),
    }
}
