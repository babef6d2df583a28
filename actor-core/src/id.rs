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

//! actor and call identity types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// identity of an actor: a human-readable name plus a per-process unique id.
/// two actors can share a name (e.g. restarted instances) but never an instance_uid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId {
    pub name: String,
    pub instance_uid: Uuid,
}

impl ActorId {
    pub fn new(name: impl ToString) -> Self {
        ActorId { name: name.to_string(), instance_uid: Uuid::new_v4() }
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.instance_uid)
    }
}

/// unique id of one RPC invocation, scoping its reply inbox on the caller side
/// and its task bookkeeping on the responder side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        CallId(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_actors_share_name_but_not_uid() {
        let a = ActorId::new("worker");
        let b = ActorId::new("worker");
        assert_eq!(a.name, b.name);
        assert_ne!(a.instance_uid, b.instance_uid);
        assert_ne!(a, b);
    }

    #[test]
    fn call_ids_are_unique() {
        let a = CallId::new();
        let b = CallId::new();
        assert_ne!(a, b);
    }
}
