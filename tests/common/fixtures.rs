//! Mock program and capture wiring used across integration tests.

use std::sync::Arc;

use jitcap::capture::CaptureCompiler;
use jitcap::compiler::mock::{CompileStep, ScriptedCompiler};
use jitcap::config::CaptureConfig;
use jitcap::host::mock::{MockClass, MockHost, MockMethod};
use jitcap::host::{ClassHandle, FieldHandle, MethodHandle, ModuleHandle, ResolvedToken};
use jitcap::sink::{MemorySink, PersistenceSink};
use jitcap::MethodInfo;

pub const MODULE: ModuleHandle = ModuleHandle(0x1);
pub const PROGRAM: ClassHandle = ClassHandle(0x10);
pub const POINT: ClassHandle = ClassHandle(0x11);
pub const MAIN: MethodHandle = MethodHandle(0x20);
pub const LENGTH: MethodHandle = MethodHandle(0x21);
pub const POINT_X: FieldHandle = FieldHandle(0x30);
/// Token for `Point.X` in [`MODULE`].
pub const POINT_X_TOKEN: u32 = 0x0400_0001;

/// Host that knows `App.Program::Main`, `App.Point::Length`, and `Point.X`.
pub fn program_host() -> MockHost {
    MockHost::new()
        .with_class(PROGRAM, MockClass::reference("App.Program"))
        .with_class(POINT, MockClass::value("App.Point", 16))
        .with_method(MAIN, MockMethod::new("Main", PROGRAM))
        .with_method(LENGTH, MockMethod::new("Length", POINT))
        .with_field(POINT_X, 0)
        .with_token(
            MODULE,
            ResolvedToken {
                token: POINT_X_TOKEN,
                class: POINT,
                method: None,
                field: Some(POINT_X),
            },
        )
        .with_config("TieredCompilation", "0")
}

/// Host with `count` methods `0x100..0x100+count`, all declared on `App.Program`.
pub fn many_methods_host(count: u64) -> MockHost {
    (0..count).fold(
        MockHost::new().with_class(PROGRAM, MockClass::reference("App.Program")),
        |host, i| {
            host.with_method(
                MethodHandle(0x100 + i),
                MockMethod::new(format!("M{i}"), PROGRAM),
            )
        },
    )
}

pub fn method_info(method: MethodHandle) -> MethodInfo {
    MethodInfo::new(method, MODULE, vec![0x02, 0x7b, 0x01, 0x00, 0x00, 0x04, 0x2a])
}

/// A typical successful compile: metadata lookups, a token, then code.
pub fn typical_steps(code: Vec<u8>) -> Vec<CompileStep> {
    vec![
        CompileStep::MethodAttribs,
        CompileStep::MethodClass,
        CompileStep::ResolveToken(POINT_X_TOKEN),
        CompileStep::FieldOffset(POINT_X),
        CompileStep::EmitCode(code),
        CompileStep::AllocGcInfo(8),
    ]
}

pub fn capture_with(
    steps: Vec<CompileStep>,
    sink: Arc<dyn PersistenceSink>,
    config: &CaptureConfig,
) -> CaptureCompiler<ScriptedCompiler> {
    CaptureCompiler::new(ScriptedCompiler::new(steps), sink, config)
}

/// Capture compiler over a fresh in-memory sink with default settings.
pub fn memory_capture(
    steps: Vec<CompileStep>,
) -> (CaptureCompiler<ScriptedCompiler>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let compiler = capture_with(steps, sink.clone(), &CaptureConfig::default());
    (compiler, sink)
}
