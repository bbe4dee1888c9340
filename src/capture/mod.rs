//! Interception and crash-safe recording of compile invocations.

pub mod call;
pub mod context;
pub mod facade;
pub mod global;
pub mod interceptor;
pub mod priming;
pub mod protocol;

pub use call::{CallOrigin, HostCall, InterceptedCall};
pub use context::{CompilationContext, ContextError, FaultOutcome, RequestMetadata};
pub use facade::CaptureCompiler;
pub use global::{GlobalContext, RecordingConfigHost};
pub use interceptor::InterceptingHost;
pub use priming::{PrimingMode, PrimingReport, PrimingSet, WELL_KNOWN_BUILTINS};
pub use protocol::{CapturePhase, CaptureSession, SessionOptions};
