//! Method-channel bridge between a UI layer and a native download/IPFS engine.
//! The UI sends named method calls with arguments; the bridge validates them, runs the
//! engine off the caller's thread and answers with a success value or a coded error.

pub mod channel;
pub mod dispatch;
pub mod engine;
pub mod ffi;
pub mod operation;
pub mod protocol;
pub mod records;
pub mod value;
pub mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use channel::{Channel, ChannelClosed, ChannelHandle, PendingResponse, DEFAULT_QUEUE_CAPACITY};
pub use dispatch::Dispatcher;
pub use engine::{Engine, EngineError, EngineResult};
pub use ffi::{EngineVTable, VTableEngine};
pub use operation::{ErrorCode, Method, Operation, ParseError};
pub use protocol::{MethodCall, Reply, Response, DEFAULT_CHANNEL, PROTOCOL_VERSION};
pub use records::{DirectoryEntry, EntryType, HttpServicesStatus, NodeInfo, ProgressInfo};
pub use value::{ArgError, Arguments, Value};
pub use wire::{
    decode_call, decode_frame, decode_response, encode_call, encode_frame, encode_response,
    FrameDecodeError, FrameEncodeError, FrameError,
};
