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

//! wire message grammar. one [`Frame`] per length-delimited packet; the
//! `Option<Frame>` at the codec level carries the `null` terminator sentinel.

use serde::{Deserialize, Serialize};

use crate::id::{ActorId, CallId};
use crate::value::Value;

/// classification sent as a preamble before the first `return`/`yield`, matching
/// the three invocation shapes a remote function may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncType {
    Function,
    AsyncFunction,
    AsyncGen,
}

impl FuncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuncType::Function => "function",
            FuncType::AsyncFunction => "asyncfunction",
            FuncType::AsyncGen => "asyncgen",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Frame {
    /// handshake identity, sent as the very first message on a new channel.
    Hello(ActorId),

    /// caller -> responder: invoke `ns.func(kwargs)` on behalf of `caller`.
    Cmd { ns: String, func: String, kwargs: Value, caller: ActorId, cid: CallId },

    /// responder -> caller: classification preamble.
    FuncType { cid: CallId, functype: FuncType },

    /// responder -> caller: terminal single result.
    Return { cid: CallId, value: Value },

    /// responder -> caller: one streamed item.
    Yield { cid: CallId, value: Value },

    /// responder -> caller: stream end.
    Stop { cid: CallId },

    /// either direction: terminal failure. `cid: None` means an actor-level
    /// error rather than a single call's failure.
    Error { cid: Option<CallId>, message: String },
}

impl Frame {
    pub fn cid(&self) -> Option<CallId> {
        match self {
            Frame::Cmd { cid, .. }
            | Frame::FuncType { cid, .. }
            | Frame::Return { cid, .. }
            | Frame::Yield { cid, .. }
            | Frame::Stop { cid } => Some(*cid),
            Frame::Error { cid, .. } => *cid,
            Frame::Hello(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Return { .. } | Frame::Stop { .. } | Frame::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_without_cid_is_actor_level() {
        let f = Frame::Error { cid: None, message: "boom".into() };
        assert_eq!(f.cid(), None);
        assert!(f.is_terminal());
    }

    #[test]
    fn cmd_carries_its_cid() {
        let cid = CallId::new();
        let f = Frame::Cmd {
            ns: "math".into(),
            func: "add".into(),
            kwargs: Value::Null,
            caller: ActorId::new("a"),
            cid,
        };
        assert_eq!(f.cid(), Some(cid));
        assert!(!f.is_terminal());
    }
}
