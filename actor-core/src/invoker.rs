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

//! runs a locally-registered function on behalf of a remote caller, and
//! packages its result(s) into reply frames.
//!
//! functions are registered ahead of time under `(namespace, name)` -- there
//! is no runtime signature introspection. each registration declares its
//! own [`InvocationKind`], which the wire's `functype` preamble mirrors.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::channel::ChannelSender;
use crate::errors::{ActorError, Result};
use crate::id::CallId;
use crate::value::Value;
use crate::wire::{Frame, FuncType};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type ValueFn = dyn Fn(Value) -> Result<Value> + Send + Sync;
type AsyncValueFn = dyn Fn(Value) -> BoxFuture<Result<Value>> + Send + Sync;
type StreamFn = dyn Fn(Value) -> BoxStream<'static, Result<Value>> + Send + Sync;

/// the three invocation shapes a remote function may have, mirrored on the
/// wire by [`FuncType`].
#[derive(Clone)]
pub enum Callable {
    Value(Arc<ValueFn>),
    AsyncValue(Arc<AsyncValueFn>),
    Stream(Arc<StreamFn>),
}

impl Callable {
    pub fn func_type(&self) -> FuncType {
        match self {
            Callable::Value(_) => FuncType::Function,
            Callable::AsyncValue(_) => FuncType::AsyncFunction,
            Callable::Stream(_) => FuncType::AsyncGen,
        }
    }
}

#[derive(Clone)]
pub struct FuncDescriptor {
    pub name: String,
    pub callable: Callable,
}

impl FuncDescriptor {
    pub fn value(name: impl ToString, f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static) -> Self {
        FuncDescriptor { name: name.to_string(), callable: Callable::Value(Arc::new(f)) }
    }

    pub fn async_value<F>(name: impl ToString, f: impl Fn(Value) -> F + Send + Sync + 'static) -> Self
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        FuncDescriptor {
            name: name.to_string(),
            callable: Callable::AsyncValue(Arc::new(move |v| Box::pin(f(v)))),
        }
    }

    pub fn stream<S>(name: impl ToString, f: impl Fn(Value) -> S + Send + Sync + 'static) -> Self
    where
        S: futures::Stream<Item = Result<Value>> + Send + 'static,
    {
        FuncDescriptor {
            name: name.to_string(),
            callable: Callable::Stream(Arc::new(move |v| f(v).boxed())),
        }
    }
}

/// a named table of [`FuncDescriptor`]s, addressed on the wire as a
/// `namespace`.
#[derive(Clone, Default)]
pub struct RpcModule {
    funcs: HashMap<String, FuncDescriptor>,
}

impl RpcModule {
    pub fn new() -> Self {
        RpcModule { funcs: HashMap::new() }
    }

    pub fn register(mut self, desc: FuncDescriptor) -> Self {
        self.funcs.insert(desc.name.clone(), desc);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FuncDescriptor> {
        self.funcs.get(name)
    }
}

/// `namespace -> module` table resolved once at actor startup. an unknown
/// declared namespace at registration time is a startup error; an unknown
/// namespace at call time is an RPC-level error reported to the caller.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, RpcModule>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry { modules: HashMap::new() }
    }

    pub fn with_module(mut self, ns: impl ToString, module: RpcModule) -> Self {
        self.modules.insert(ns.to_string(), module);
        self
    }

    pub fn resolve(&self, ns: &str, func: &str) -> Result<&FuncDescriptor> {
        let module = self
            .modules
            .get(ns)
            .ok_or_else(|| ActorError::UnknownNamespace(ns.to_string()))?;
        module.get(func).ok_or_else(|| ActorError::UnknownFunction { ns: ns.to_string(), func: func.to_string() })
    }
}

/// runs one invocation to completion, writing its frames through `sender`.
/// never propagates a function error out of this task -- it is always
/// converted into a terminal `Error` frame for this call, and the message
/// loop keeps serving other calls.
pub async fn invoke(
    desc: FuncDescriptor,
    kwargs: Value,
    cid: CallId,
    sender: ChannelSender,
    cancel: CancellationToken,
) {
    let functype = desc.callable.func_type();
    if sender.send(Frame::FuncType { cid, functype }).is_err() {
        return;
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!(?cid, "invocation cancelled before completion");
        }
        () = run(desc.callable, kwargs, cid, &sender) => {}
    }
}

async fn run(callable: Callable, kwargs: Value, cid: CallId, sender: &ChannelSender) {
    match callable {
        Callable::Value(f) => {
            let frame = match f(kwargs) {
                Ok(value) => Frame::Return { cid, value },
                Err(e) => Frame::Error { cid: Some(cid), message: e.to_string() },
            };
            let _ = sender.send(frame);
        }
        Callable::AsyncValue(f) => {
            let frame = match f(kwargs).await {
                Ok(value) => Frame::Return { cid, value },
                Err(e) => Frame::Error { cid: Some(cid), message: e.to_string() },
            };
            let _ = sender.send(frame);
        }
        Callable::Stream(f) => {
            let mut stream = f(kwargs);
            loop {
                match stream.next().await {
                    Some(Ok(value)) => {
                        if sender.send(Frame::Yield { cid, value }).is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = sender.send(Frame::Error { cid: Some(cid), message: e.to_string() });
                        return;
                    }
                    None => {
                        let _ = sender.send(Frame::Stop { cid });
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn test_sender() -> (ChannelSender, tokio::sync::mpsc::UnboundedReceiver<Frame>) {
        // mirror ChannelSender's internals via its public constructor path:
        // build a raw mpsc pair and wrap it the same way `Channel::split` does.
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (ChannelSender::from_raw(tx), rx)
    }

    #[tokio::test]
    async fn value_invocation_sends_functype_then_return() {
        let (sender, mut rx) = test_sender();
        let desc = FuncDescriptor::value("add", |kwargs| {
            let a = kwargs.get("a").and_then(Value::as_i64).unwrap_or(0);
            let b = kwargs.get("b").and_then(Value::as_i64).unwrap_or(0);
            Ok(Value::Int(a + b))
        });
        let cid = CallId::new();
        let kwargs = crate::kwargs! { "a" => Value::Int(2), "b" => Value::Int(3) };
        invoke(desc, kwargs, cid, sender, CancellationToken::new()).await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, Frame::FuncType { functype: FuncType::Function, .. }));
        let second = rx.recv().await.unwrap();
        match second {
            Frame::Return { value, .. } => assert_eq!(value.as_i64(), Some(5)),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_invocation_yields_then_stops() {
        let (sender, mut rx) = test_sender();
        let desc = FuncDescriptor::stream("count_to", |kwargs| {
            let n = kwargs.get("n").and_then(Value::as_i64).unwrap_or(0);
            stream::iter((0..n).map(|i| Ok(Value::Int(i))))
        });
        let cid = CallId::new();
        let kwargs = crate::kwargs! { "n" => Value::Int(3) };
        invoke(desc, kwargs, cid, sender, CancellationToken::new()).await;

        assert!(matches!(rx.recv().await.unwrap(), Frame::FuncType { functype: FuncType::AsyncGen, .. }));
        for expected in 0..3 {
            match rx.recv().await.unwrap() {
                Frame::Yield { value, .. } => assert_eq!(value.as_i64(), Some(expected)),
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert!(matches!(rx.recv().await.unwrap(), Frame::Stop { .. }));
    }

    #[tokio::test]
    async fn value_error_is_reported_as_error_frame() {
        let (sender, mut rx) = test_sender();
        let desc = FuncDescriptor::value("boom", |_| Err(ActorError::other("kaboom")));
        let cid = CallId::new();
        invoke(desc, Value::Null, cid, sender, CancellationToken::new()).await;

        let _ = rx.recv().await.unwrap(); // functype preamble
        match rx.recv().await.unwrap() {
            Frame::Error { cid: Some(got_cid), message } => {
                assert_eq!(got_cid, cid);
                assert!(message.contains("kaboom"));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
