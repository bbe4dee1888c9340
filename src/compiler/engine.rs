use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::host::{HostServices, MethodHandle, ModuleHandle};

/// Operating system the generated code targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOs {
    Windows,
    #[default]
    Linux,
    MacOs,
    Unix,
}

impl TargetOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOs::Windows => "windows",
            TargetOs::Linux => "linux",
            TargetOs::MacOs => "macos",
            TargetOs::Unix => "unix",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "windows" => Some(TargetOs::Windows),
            "linux" => Some(TargetOs::Linux),
            "macos" | "osx" => Some(TargetOs::MacOs),
            "unix" => Some(TargetOs::Unix),
            _ => None,
        }
    }
}

impl std::fmt::Display for TargetOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-compilation flags handed to the engine unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompileFlags(pub u64);

impl CompileFlags {
    pub const DEBUG_CODE: u64 = 1 << 0;
    pub const MIN_OPT: u64 = 1 << 1;
    pub const TIER0: u64 = 1 << 2;
    pub const TIER1: u64 = 1 << 3;
    pub const OSR: u64 = 1 << 4;
    pub const PROF_ENTER_LEAVE: u64 = 1 << 5;

    pub fn contains(self, bits: u64) -> bool {
        self.0 & bits == bits
    }
}

/// Instruction-set features of the machine the code will run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CpuFeatures(pub u64);

impl CpuFeatures {
    pub const SSE42: u64 = 1 << 0;
    pub const AVX2: u64 = 1 << 1;
    pub const AVX512: u64 = 1 << 2;
    pub const NEON: u64 = 1 << 3;
}

/// Description of the method body to compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub method: MethodHandle,
    pub module: ModuleHandle,
    #[serde(with = "crate::sink::record::base64_bytes")]
    pub il_code: Vec<u8>,
    pub max_stack: u32,
    pub eh_count: u32,
    #[serde(with = "crate::sink::record::base64_bytes")]
    pub locals_signature: Vec<u8>,
}

impl MethodInfo {
    pub fn new(method: MethodHandle, module: ModuleHandle, il_code: Vec<u8>) -> Self {
        Self {
            method,
            module,
            il_code,
            max_stack: 8,
            eh_count: 0,
            locals_signature: Vec::new(),
        }
    }
}

/// Immutable description of one unit of compilation.
///
/// Built by the caller and consumed when a capture session begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationRequest {
    pub info: MethodInfo,
    pub flags: CompileFlags,
    pub target: TargetOs,
}

impl CompilationRequest {
    pub fn new(info: MethodInfo, flags: CompileFlags, target: TargetOs) -> Self {
        Self {
            info,
            flags,
            target,
        }
    }
}

/// Result code returned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileResult {
    Ok,
    BadCode,
    OutOfMem,
    InternalError,
    Skipped,
    ImplLimitation,
}

impl CompileResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CompileResult::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompileResult::Ok => "ok",
            CompileResult::BadCode => "bad_code",
            CompileResult::OutOfMem => "out_of_mem",
            CompileResult::InternalError => "internal_error",
            CompileResult::Skipped => "skipped",
            CompileResult::ImplLimitation => "impl_limitation",
        }
    }
}

/// The `(result, entry, size)` triple an engine hands back from `compile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOutput {
    pub result: CompileResult,
    pub entry: u64,
    pub code_size: u32,
}

impl CompileOutput {
    pub fn success(entry: u64, code_size: u32) -> Self {
        Self {
            result: CompileResult::Ok,
            entry,
            code_size,
        }
    }

    pub fn failure(result: CompileResult) -> Self {
        Self {
            result,
            entry: 0,
            code_size: 0,
        }
    }
}

/// Entry points of a code-generation engine.
///
/// `compile` may be called from several threads at once, each with its own
/// host. `set_target_os` takes `&mut self`, so it can only run while no
/// compilation holds a shared borrow of the engine.
pub trait Compiler {
    fn compile(
        &self,
        host: &dyn HostServices,
        info: &MethodInfo,
        flags: CompileFlags,
    ) -> CompileOutput;

    fn set_target_os(&mut self, os: TargetOs);

    fn version_identifier(&self) -> Uuid;

    fn max_vector_width(&self, cpu: CpuFeatures) -> u32;

    fn process_shutdown(&self, host: &dyn HostServices);
}
