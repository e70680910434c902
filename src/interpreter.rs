mod environment;
mod host;
mod interpreter;

pub use environment::{ActivationRecord, CallStack, FrameKind, OperandStack, Value};
pub use host::{DispatchError, Host, HostEvent, RecordingHost, MAX_ACCESS_ARGS, MAX_CALL_ARGS};
pub use interpreter::Interpreter;
