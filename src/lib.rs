//! Transparent capture of JIT compilations.
//!
//! [`CaptureCompiler`] wraps a [`Compiler`] and stands in for it. Every
//! compile runs against an [`InterceptingHost`] that forwards each host
//! query to the real [`HostServices`] and records the call together with
//! its answer. Whatever way the compile ends (code, a failure result, or a
//! panic), the recorded context is persisted exactly once through a
//! [`PersistenceSink`] before control returns to the caller.
//!
//! ```
//! use std::sync::Arc;
//!
//! use jitcap::compiler::mock::{CompileStep, ScriptedCompiler};
//! use jitcap::host::mock::{MockClass, MockHost, MockMethod};
//! use jitcap::host::{ClassHandle, MethodHandle, ModuleHandle};
//! use jitcap::{CaptureCompiler, CaptureConfig, CompileFlags, Compiler, MemorySink, MethodInfo};
//!
//! let host = MockHost::new()
//!     .with_class(ClassHandle(0x10), MockClass::reference("App.Program"))
//!     .with_method(MethodHandle(0x20), MockMethod::new("Main", ClassHandle(0x10)));
//! let sink = Arc::new(MemorySink::new());
//! let compiler = CaptureCompiler::new(
//!     ScriptedCompiler::new(vec![CompileStep::EmitCode(vec![0xc3])]),
//!     sink.clone(),
//!     &CaptureConfig::default(),
//! );
//!
//! let info = MethodInfo::new(MethodHandle(0x20), ModuleHandle(1), vec![0x2a]);
//! let output = compiler.compile(&host, &info, CompileFlags::default());
//! assert!(output.result.is_ok());
//! assert_eq!(sink.len(), 1);
//! ```

pub mod capture;
pub mod compiler;
pub mod config;
pub mod host;
pub mod sink;
pub mod util;

pub use capture::{
    CaptureCompiler, CapturePhase, CaptureSession, CompilationContext, FaultOutcome,
    GlobalContext, InterceptedCall, InterceptingHost, PrimingMode, RecordingConfigHost,
};
pub use compiler::{
    CompilationRequest, CompileFlags, CompileOutput, CompileResult, Compiler, MethodInfo, TargetOs,
};
pub use config::CaptureConfig;
pub use host::{ConfigHost, HostError, HostServices};
pub use sink::{CompilationRecord, JsonlArtifactWriter, MemorySink, PersistenceSink, SinkError};
