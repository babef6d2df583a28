//! small ergonomic macros for building [`crate::invoker::RpcModule`]s, in
//! the same declarative-macro spirit as the teacher's `msg_callback!`
//! family -- no proc-macros, no compile-time message-enum generation.

/// `rpc_module! {
///     "add" => value |kwargs| { ... },
///     "fetch" => async |kwargs| { ... },
///     "count_to" => stream |kwargs| { ... },
/// }`
#[macro_export]
macro_rules! rpc_module {
    ( $( $name:expr => $kind:tt $f:expr ),* $(,)? ) => {{
        let mut m = $crate::invoker::RpcModule::new();
        $( m = m.register($crate::rpc_module!(@desc $kind, $name, $f)); )*
        m
    }};
    (@desc value, $name:expr, $f:expr) => {
        $crate::invoker::FuncDescriptor::value($name, $f)
    };
    (@desc async, $name:expr, $f:expr) => {
        $crate::invoker::FuncDescriptor::async_value($name, $f)
    };
    (@desc stream, $name:expr, $f:expr) => {
        $crate::invoker::FuncDescriptor::stream($name, $f)
    };
}
