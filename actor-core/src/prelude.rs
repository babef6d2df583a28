pub use crate::id::{ActorId, CallId};
pub use crate::value::Value;
pub use crate::wire::{Frame, FuncType};
pub use crate::channel::{Channel, ChannelReader, ChannelSender};
pub use crate::invoker::{Callable, FuncDescriptor, ModuleRegistry, RpcModule};
pub use crate::rpc_client::{InboxTable, ReplyInbox, RpcClient};
pub use crate::lifecycle::{self, ActorHandle};
pub use crate::arbiter;
pub use crate::errors::{ActorError, Result};
pub use crate::{kwargs, rpc_module};
