/*
 * Copyright (c) 2023, United States Government, as represented by the
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
use thiserror::Error;
use std::time::Duration;

use crate::id::{ActorId, CallId};

pub type Result<T> = std::result::Result<T, ActorError>;

#[derive(Error,Debug)]
pub enum ActorError {

    #[error("channel closed")]
    ChannelClosed,

    #[error("receiver queue full")]
    ReceiverFull,

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("connect to {0} failed: {1}")]
    ConnectFailed(String,String),

    #[error("bind failed on {0}: {1}")]
    BindFailed(String,String),

    #[error("timeout error: {0:?}")]
    TimeoutError(Duration),

    #[error("unknown actor namespace: {0}")]
    UnknownNamespace(String),

    #[error("unknown function {ns}.{func}")]
    UnknownFunction { ns: String, func: String },

    #[error("rpc call {0:?} failed: {1}")]
    CallFailed(CallId,String),

    #[error("reply inbox closed for call {0:?}")]
    InboxClosed(CallId),

    #[error("actor {0:?} not found")]
    ActorNotFound(ActorId),

    #[error("actor name {0} not registered with arbiter")]
    NameNotRegistered(String),

    #[error("actor-level error from {0:?}: {1}")]
    PeerError(ActorId,String),

    #[error("{op} failed for {failed} out of {all} peers")]
    AllOpFailed { op: String, all: usize, failed: usize },

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("encode/decode error {0}")]
    EncodeError( #[from] bincode::Error),

    #[error("config error {0}")]
    ConfigError( #[from] actor_config::errors::ActorConfigError),

    #[error("failed to join task: {0}")]
    JoinError( #[from] tokio::task::JoinError),

    #[error("actor already cancelled")]
    AlreadyCancelled,

    // a generic error
    #[error("operation failed {0}")]
    OpFailed(String)
}

pub fn all_op_result (op: &'static str, total: usize, failed: usize)->Result<()> {
    if failed == 0 { Ok(()) } else { Err(all_op_failed( op, total, failed)) }
}

pub fn all_op_failed <T: ToString> (op: T, all: usize, failed: usize)->ActorError {
    ActorError::AllOpFailed { op: op.to_string(), all, failed }
}

pub fn op_failed (msg: impl ToString)->ActorError {
    ActorError::OpFailed(msg.to_string())
}

impl ActorError {
    pub fn other(msg: impl ToString) -> Self {
        ActorError::OpFailed(msg.to_string())
    }
}
