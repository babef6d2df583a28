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

//! configuration types for actor endpoints, loaded with [`crate::load_config`]

use std::time::Duration;
use serde::{Deserialize,Serialize};
use crate::{deserialize_duration,serialize_duration};

/// (host,port) pair as it appears in RON config files
#[derive(Debug,Clone,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub struct HostPort {
    pub host: String,
    pub port: u16
}

impl HostPort {
    pub fn new (host: impl ToString, port: u16)->Self {
        HostPort { host: host.to_string(), port }
    }
}

impl std::fmt::Display for HostPort {
    fn fmt (&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// the config an actor process needs in order to join a runtime: its own bind
/// address, the arbiter it registers with and an optional parent to report errors to.
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct ActorEndpointConfig {
    pub name: String,
    pub bind_addr: HostPort,
    pub arbiter_addr: HostPort,
    pub parent_addr: Option<HostPort>,

    #[serde(serialize_with="serialize_duration", deserialize_with="deserialize_duration", default="default_cancel_timeout")]
    pub cancel_timeout: Duration,
}

fn default_cancel_timeout()->Duration { Duration::from_secs(5) }

/// the config for a standalone arbiter process (just the bind address)
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct ArbiterEndpointConfig {
    pub bind_addr: HostPort,
}
