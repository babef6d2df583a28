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

//! process/task-local binding for "the actor running in this task tree",
//! read by free-function helpers (`find_actor`, `wait_for_actor`) instead of
//! a global mutable slot.

use crate::lifecycle::ActorHandle;

tokio::task_local! {
    static CURRENT_ACTOR: ActorHandle;
}

/// run `f` with `handle` bound as the current actor for this task tree.
/// actor bootstrap calls this once around the actor's root scope.
pub async fn scope<F, Fut, T>(handle: ActorHandle, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    CURRENT_ACTOR.scope(handle, f()).await
}

/// the actor running in the current task tree, if any. panics (matching the
/// source runtime's `current_actor()`) when called outside an actor scope --
/// callers that need a fallible form should check [`try_current`] instead.
pub fn current() -> ActorHandle {
    CURRENT_ACTOR.with(|a| a.clone())
}

pub fn try_current() -> Option<ActorHandle> {
    CURRENT_ACTOR.try_with(|a| a.clone()).ok()
}
