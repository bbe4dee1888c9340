pub mod engine;
pub mod mock;

pub use engine::{
    CompilationRequest, CompileFlags, CompileOutput, CompileResult, Compiler, CpuFeatures,
    MethodInfo, TargetOs,
};
