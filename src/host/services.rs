use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{
    AllocMemRequest, AllocMemResponse, BuiltinClass, ClassAttribs, ClassHandle, CorInfoType,
    FieldHandle, MethodAttribs, MethodHandle, MethodName, ModuleHandle, ResolvedToken,
};

/// Recoverable answer a host gives when it cannot satisfy a query.
///
/// These are ordinary answers from the engine's point of view, so they are
/// recorded and replayed like any other value.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum HostError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid handle: {0:#x}")]
    InvalidHandle(u64),
    #[error("Out of memory allocating {requested} bytes")]
    OutOfMemory { requested: u64 },
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// The callback surface a code-generation engine uses to query its host.
///
/// Every method takes `&self`; hosts that mutate state while answering
/// (allocation, code writes) use interior mutability. The trait is object
/// safe so engines receive it as `&dyn HostServices`.
pub trait HostServices {
    fn get_builtin_class(&self, id: BuiltinClass) -> Option<ClassHandle>;

    fn get_method_class(&self, method: MethodHandle) -> Result<ClassHandle, HostError>;

    fn get_method_name(&self, method: MethodHandle) -> Result<MethodName, HostError>;

    fn get_method_attribs(&self, method: MethodHandle) -> Result<MethodAttribs, HostError>;

    fn get_class_attribs(&self, class: ClassHandle) -> Result<ClassAttribs, HostError>;

    fn get_class_name(&self, class: ClassHandle) -> Result<String, HostError>;

    fn is_value_class(&self, class: ClassHandle) -> Result<bool, HostError>;

    fn as_cor_info_type(&self, class: ClassHandle) -> Result<CorInfoType, HostError>;

    fn get_class_size(&self, class: ClassHandle) -> Result<u32, HostError>;

    fn resolve_token(&self, module: ModuleHandle, token: u32) -> Result<ResolvedToken, HostError>;

    fn get_field_offset(&self, field: FieldHandle) -> Result<u32, HostError>;

    fn alloc_mem(&self, request: AllocMemRequest) -> Result<AllocMemResponse, HostError>;

    fn alloc_gc_info(&self, size: u32) -> Result<u64, HostError>;

    /// Copy generated bytes into memory previously returned by `alloc_mem`.
    fn write_code(&self, address: u64, bytes: &[u8]) -> Result<(), HostError>;

    /// Snapshot `len` bytes of generated code starting at `address`.
    ///
    /// Only the capture layer calls this, after the engine has returned.
    /// Hosts that cannot expose their code memory keep the default.
    fn read_code(&self, _address: u64, _len: u32) -> Option<Vec<u8>> {
        None
    }
}
