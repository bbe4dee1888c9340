use super::call::HostCall;
use super::context::FaultOutcome;
use super::protocol::CaptureSession;
use crate::host::{
    AllocMemRequest, AllocMemResponse, BuiltinClass, ClassAttribs, ClassHandle, CorInfoType,
    FieldHandle, HostError, HostServices, MethodAttribs, MethodHandle, MethodName, ModuleHandle,
    ResolvedToken,
};

/// Host view handed to the engine during a captured compile.
///
/// Each query is forwarded to the real host, the call and its answer are
/// appended to the session's context, and the answer is returned unchanged.
/// Nothing is cached: repeated queries reach the real host every time and
/// are recorded every time.
pub struct InterceptingHost<'s> {
    real: &'s dyn HostServices,
    session: &'s CaptureSession<'s>,
}

impl<'s> InterceptingHost<'s> {
    pub(crate) fn new(real: &'s dyn HostServices, session: &'s CaptureSession<'s>) -> Self {
        Self { real, session }
    }

    /// Persist the context now, ahead of the compile returning.
    ///
    /// Used by engines that know the rest of the compile is not worth
    /// recording (or may not return). Returns `false` if the context was
    /// already persisted or the engine is not running.
    pub fn commit_early(&self, outcome: FaultOutcome) -> bool {
        self.session.commit_early(outcome)
    }

    pub fn saved_early(&self) -> bool {
        self.session.is_persisted()
    }

    fn forward<T: Clone>(&self, answer: T, record: impl FnOnce(T) -> HostCall) -> T {
        self.session.record(record(answer.clone()));
        answer
    }
}

impl HostServices for InterceptingHost<'_> {
    fn get_builtin_class(&self, id: BuiltinClass) -> Option<ClassHandle> {
        self.forward(self.real.get_builtin_class(id), |answer| {
            HostCall::GetBuiltinClass { id, answer }
        })
    }

    fn get_method_class(&self, method: MethodHandle) -> Result<ClassHandle, HostError> {
        self.forward(self.real.get_method_class(method), |answer| {
            HostCall::GetMethodClass { method, answer }
        })
    }

    fn get_method_name(&self, method: MethodHandle) -> Result<MethodName, HostError> {
        self.forward(self.real.get_method_name(method), |answer| {
            HostCall::GetMethodName { method, answer }
        })
    }

    fn get_method_attribs(&self, method: MethodHandle) -> Result<MethodAttribs, HostError> {
        self.forward(self.real.get_method_attribs(method), |answer| {
            HostCall::GetMethodAttribs { method, answer }
        })
    }

    fn get_class_attribs(&self, class: ClassHandle) -> Result<ClassAttribs, HostError> {
        self.forward(self.real.get_class_attribs(class), |answer| {
            HostCall::GetClassAttribs { class, answer }
        })
    }

    fn get_class_name(&self, class: ClassHandle) -> Result<String, HostError> {
        self.forward(self.real.get_class_name(class), |answer| {
            HostCall::GetClassName { class, answer }
        })
    }

    fn is_value_class(&self, class: ClassHandle) -> Result<bool, HostError> {
        self.forward(self.real.is_value_class(class), |answer| {
            HostCall::IsValueClass { class, answer }
        })
    }

    fn as_cor_info_type(&self, class: ClassHandle) -> Result<CorInfoType, HostError> {
        self.forward(self.real.as_cor_info_type(class), |answer| {
            HostCall::AsCorInfoType { class, answer }
        })
    }

    fn get_class_size(&self, class: ClassHandle) -> Result<u32, HostError> {
        self.forward(self.real.get_class_size(class), |answer| {
            HostCall::GetClassSize { class, answer }
        })
    }

    fn resolve_token(&self, module: ModuleHandle, token: u32) -> Result<ResolvedToken, HostError> {
        self.forward(self.real.resolve_token(module, token), |answer| {
            HostCall::ResolveToken {
                module,
                token,
                answer,
            }
        })
    }

    fn get_field_offset(&self, field: FieldHandle) -> Result<u32, HostError> {
        self.forward(self.real.get_field_offset(field), |answer| {
            HostCall::GetFieldOffset { field, answer }
        })
    }

    fn alloc_mem(&self, request: AllocMemRequest) -> Result<AllocMemResponse, HostError> {
        self.forward(self.real.alloc_mem(request), |answer| HostCall::AllocMem {
            request,
            answer,
        })
    }

    fn alloc_gc_info(&self, size: u32) -> Result<u64, HostError> {
        self.forward(self.real.alloc_gc_info(size), |answer| {
            HostCall::AllocGcInfo { size, answer }
        })
    }

    fn write_code(&self, address: u64, bytes: &[u8]) -> Result<(), HostError> {
        self.forward(self.real.write_code(address, bytes), |answer| {
            HostCall::WriteCode {
                address,
                bytes: bytes.to_vec(),
                answer,
            }
        })
    }

    // Not part of the engine's conversation with the host; not recorded.
    fn read_code(&self, address: u64, len: u32) -> Option<Vec<u8>> {
        self.real.read_code(address, len)
    }
}
