use serde::{Deserialize, Serialize};

use crate::host::{
    AllocMemRequest, AllocMemResponse, BuiltinClass, ClassAttribs, ClassHandle, CorInfoType,
    FieldHandle, HostError, MethodAttribs, MethodHandle, MethodName, ModuleHandle,
    ResolvedToken,
};
use crate::sink::record::base64_bytes;

/// Who issued a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOrigin {
    /// Forced by the capture layer before the engine starts.
    Priming,
    /// Made by the engine while compiling.
    Compiler,
    /// Made against process-wide configuration, outside any method.
    Global,
}

/// A host query together with the answer the real host gave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum HostCall {
    GetBuiltinClass {
        id: BuiltinClass,
        answer: Option<ClassHandle>,
    },
    GetMethodClass {
        method: MethodHandle,
        answer: Result<ClassHandle, HostError>,
    },
    GetMethodName {
        method: MethodHandle,
        answer: Result<MethodName, HostError>,
    },
    GetMethodAttribs {
        method: MethodHandle,
        answer: Result<MethodAttribs, HostError>,
    },
    GetClassAttribs {
        class: ClassHandle,
        answer: Result<ClassAttribs, HostError>,
    },
    GetClassName {
        class: ClassHandle,
        answer: Result<String, HostError>,
    },
    IsValueClass {
        class: ClassHandle,
        answer: Result<bool, HostError>,
    },
    AsCorInfoType {
        class: ClassHandle,
        answer: Result<CorInfoType, HostError>,
    },
    GetClassSize {
        class: ClassHandle,
        answer: Result<u32, HostError>,
    },
    ResolveToken {
        module: ModuleHandle,
        token: u32,
        answer: Result<ResolvedToken, HostError>,
    },
    GetFieldOffset {
        field: FieldHandle,
        answer: Result<u32, HostError>,
    },
    AllocMem {
        request: AllocMemRequest,
        answer: Result<AllocMemResponse, HostError>,
    },
    AllocGcInfo {
        size: u32,
        answer: Result<u64, HostError>,
    },
    WriteCode {
        address: u64,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
        answer: Result<(), HostError>,
    },
    GetIntConfig {
        name: String,
        default: i32,
        answer: i32,
    },
    GetStringConfig {
        name: String,
        answer: Option<String>,
    },
}

impl HostCall {
    /// Snake-case name of the query, as it appears in the artifact.
    pub fn query_name(&self) -> &'static str {
        match self {
            HostCall::GetBuiltinClass { .. } => "get_builtin_class",
            HostCall::GetMethodClass { .. } => "get_method_class",
            HostCall::GetMethodName { .. } => "get_method_name",
            HostCall::GetMethodAttribs { .. } => "get_method_attribs",
            HostCall::GetClassAttribs { .. } => "get_class_attribs",
            HostCall::GetClassName { .. } => "get_class_name",
            HostCall::IsValueClass { .. } => "is_value_class",
            HostCall::AsCorInfoType { .. } => "as_cor_info_type",
            HostCall::GetClassSize { .. } => "get_class_size",
            HostCall::ResolveToken { .. } => "resolve_token",
            HostCall::GetFieldOffset { .. } => "get_field_offset",
            HostCall::AllocMem { .. } => "alloc_mem",
            HostCall::AllocGcInfo { .. } => "alloc_gc_info",
            HostCall::WriteCode { .. } => "write_code",
            HostCall::GetIntConfig { .. } => "get_int_config",
            HostCall::GetStringConfig { .. } => "get_string_config",
        }
    }

    /// Whether the host answered with a recoverable error.
    pub fn is_error(&self) -> bool {
        match self {
            HostCall::GetMethodClass { answer, .. } => answer.is_err(),
            HostCall::GetMethodName { answer, .. } => answer.is_err(),
            HostCall::GetMethodAttribs { answer, .. } => answer.is_err(),
            HostCall::GetClassAttribs { answer, .. } => answer.is_err(),
            HostCall::GetClassName { answer, .. } => answer.is_err(),
            HostCall::IsValueClass { answer, .. } => answer.is_err(),
            HostCall::AsCorInfoType { answer, .. } => answer.is_err(),
            HostCall::GetClassSize { answer, .. } => answer.is_err(),
            HostCall::ResolveToken { answer, .. } => answer.is_err(),
            HostCall::GetFieldOffset { answer, .. } => answer.is_err(),
            HostCall::AllocMem { answer, .. } => answer.is_err(),
            HostCall::AllocGcInfo { answer, .. } => answer.is_err(),
            HostCall::WriteCode { answer, .. } => answer.is_err(),
            HostCall::GetBuiltinClass { .. }
            | HostCall::GetIntConfig { .. }
            | HostCall::GetStringConfig { .. } => false,
        }
    }
}

/// One recorded callback. Immutable once appended to a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedCall {
    /// Position in the log it was appended to, starting at 0.
    pub seq: u32,
    pub origin: CallOrigin,
    #[serde(flatten)]
    pub call: HostCall,
}
