//! Scripted compiler for deterministic testing
//!
//! Implements [`Compiler`] by replaying a fixed list of host queries, so a
//! test controls exactly which callbacks an "engine" makes and how the
//! compile ends: with code, with a failure code, or with a panic.
//!
//! # Example
//! ```
//! use jitcap::compiler::mock::{CompileStep, ScriptedCompiler};
//!
//! let compiler = ScriptedCompiler::new(vec![
//!     CompileStep::MethodClass,
//!     CompileStep::MethodName,
//!     CompileStep::EmitCode(vec![0x55, 0x48, 0x89, 0xe5, 0xc3]),
//! ]);
//! assert_eq!(compiler.steps().len(), 3);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use uuid::Uuid;

use super::engine::{
    CompileFlags, CompileOutput, CompileResult, Compiler, CpuFeatures, MethodInfo, TargetOs,
};
use crate::host::{AllocMemRequest, BuiltinClass, ClassHandle, FieldHandle, HostServices};

/// Fixed version identifier reported by [`ScriptedCompiler`].
pub const SCRIPTED_COMPILER_VERSION: Uuid = Uuid::from_u128(0x6a69_7463_6170_0000_0000_0000_0000_0001);

/// One action a [`ScriptedCompiler`] takes during `compile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileStep {
    /// Ask for the class declaring the method being compiled.
    MethodClass,
    /// Ask for the name of the method being compiled.
    MethodName,
    /// Ask for the attributes of the method being compiled.
    MethodAttribs,
    Builtin(BuiltinClass),
    ClassAttribs(ClassHandle),
    ClassName(ClassHandle),
    ClassSize(ClassHandle),
    /// Resolve a token in the method's own module.
    ResolveToken(u32),
    FieldOffset(FieldHandle),
    /// Allocate code memory, write these bytes, and report them as the method body.
    EmitCode(Vec<u8>),
    AllocGcInfo(u32),
    /// Stop compiling and return this result code.
    Fail(CompileResult),
    /// Stop compiling and return this output as is.
    Return(CompileOutput),
    /// Panic with this message.
    Panic(String),
}

/// Compiler test double driven by a list of [`CompileStep`]s.
pub struct ScriptedCompiler {
    steps: Vec<CompileStep>,
    target: Option<TargetOs>,
    /// Debug rendering of every answer the host gave, in order.
    answers: Mutex<Vec<String>>,
    shutdown_calls: AtomicUsize,
}

impl ScriptedCompiler {
    pub fn new(steps: Vec<CompileStep>) -> Self {
        Self {
            steps,
            target: None,
            answers: Mutex::new(Vec::new()),
            shutdown_calls: AtomicUsize::new(0),
        }
    }

    pub fn steps(&self) -> &[CompileStep] {
        &self.steps
    }

    /// Target last set through `set_target_os`.
    pub fn target(&self) -> Option<TargetOs> {
        self.target
    }

    /// Answers observed across all compiles so far.
    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().clone()
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    fn observe(&self, answer: impl std::fmt::Debug) {
        self.answers.lock().push(format!("{answer:?}"));
    }
}

impl Compiler for ScriptedCompiler {
    fn compile(
        &self,
        host: &dyn HostServices,
        info: &MethodInfo,
        _flags: CompileFlags,
    ) -> CompileOutput {
        let mut emitted: Option<(u64, u32)> = None;

        for step in &self.steps {
            match step {
                CompileStep::MethodClass => self.observe(host.get_method_class(info.method)),
                CompileStep::MethodName => self.observe(host.get_method_name(info.method)),
                CompileStep::MethodAttribs => self.observe(host.get_method_attribs(info.method)),
                CompileStep::Builtin(id) => self.observe(host.get_builtin_class(*id)),
                CompileStep::ClassAttribs(class) => self.observe(host.get_class_attribs(*class)),
                CompileStep::ClassName(class) => self.observe(host.get_class_name(*class)),
                CompileStep::ClassSize(class) => self.observe(host.get_class_size(*class)),
                CompileStep::ResolveToken(token) => {
                    self.observe(host.resolve_token(info.module, *token))
                }
                CompileStep::FieldOffset(field) => self.observe(host.get_field_offset(*field)),
                CompileStep::EmitCode(bytes) => {
                    let request = AllocMemRequest {
                        hot_code_size: bytes.len() as u32,
                        cold_code_size: 0,
                        ro_data_size: 0,
                        alignment: 16,
                    };
                    let response = match host.alloc_mem(request) {
                        Ok(response) => response,
                        Err(err) => {
                            self.observe(&err);
                            return CompileOutput::failure(CompileResult::OutOfMem);
                        }
                    };
                    self.observe(response);
                    if let Err(err) = host.write_code(response.hot_code, bytes) {
                        self.observe(&err);
                        return CompileOutput::failure(CompileResult::InternalError);
                    }
                    emitted = Some((response.hot_code, bytes.len() as u32));
                }
                CompileStep::AllocGcInfo(size) => self.observe(host.alloc_gc_info(*size)),
                CompileStep::Fail(result) => return CompileOutput::failure(*result),
                CompileStep::Return(output) => return *output,
                CompileStep::Panic(message) => panic!("{message}"),
            }
        }

        match emitted {
            Some((entry, size)) => CompileOutput::success(entry, size),
            None => CompileOutput::failure(CompileResult::ImplLimitation),
        }
    }

    fn set_target_os(&mut self, os: TargetOs) {
        self.target = Some(os);
    }

    fn version_identifier(&self) -> Uuid {
        SCRIPTED_COMPILER_VERSION
    }

    fn max_vector_width(&self, cpu: CpuFeatures) -> u32 {
        if cpu.0 & CpuFeatures::AVX512 != 0 {
            64
        } else if cpu.0 & CpuFeatures::AVX2 != 0 {
            32
        } else {
            16
        }
    }

    fn process_shutdown(&self, _host: &dyn HostServices) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
    }
}
