use std::sync::Arc;

use uuid::Uuid;

use super::context::FaultOutcome;
use super::global::GlobalContext;
use super::priming::{PrimingMode, PrimingSet};
use super::protocol::{CaptureSession, SessionOptions};
use crate::compiler::{
    CompilationRequest, CompileFlags, CompileOutput, Compiler, CpuFeatures, MethodInfo, TargetOs,
};
use crate::config::CaptureConfig;
use crate::host::HostServices;
use crate::sink::PersistenceSink;

/// Drop-in replacement for a [`Compiler`] that records every compile.
///
/// Each `compile` gets a fresh context, primed and then recorded through an
/// intercepting host, and is persisted to the sink exactly once. The
/// administrative entrypoints are forwarded to the wrapped engine untouched.
///
/// `set_target_platform` takes `&mut self` while `compile` takes `&self`, so
/// the platform cannot change while any compile holds a borrow of the facade.
pub struct CaptureCompiler<C> {
    inner: C,
    sink: Arc<dyn PersistenceSink>,
    target: TargetOs,
    priming: PrimingSet,
    capture_code: bool,
    process_name: Option<String>,
    global: Option<Arc<GlobalContext>>,
}

impl<C: Compiler> CaptureCompiler<C> {
    pub fn new(inner: C, sink: Arc<dyn PersistenceSink>, config: &CaptureConfig) -> Self {
        let process_name = config.record_process_name.then(current_process_name);
        tracing::debug!(
            priming = config.priming.as_str(),
            capture_code = config.capture_code,
            "capture compiler ready"
        );
        Self {
            inner,
            sink,
            target: TargetOs::default(),
            priming: PrimingSet::for_mode(config.priming),
            capture_code: config.capture_code,
            process_name,
            global: None,
        }
    }

    /// Attach the process-wide configuration log copied into every record.
    pub fn with_global_context(mut self, global: Arc<GlobalContext>) -> Self {
        self.global = Some(global);
        self
    }

    pub fn with_priming(mut self, mode: PrimingMode) -> Self {
        self.priming = PrimingSet::for_mode(mode);
        self
    }

    /// Set the platform stamped on every later compile and forward it to
    /// the engine.
    pub fn set_target_platform(&mut self, os: TargetOs) {
        self.target = os;
        self.inner.set_target_os(os);
    }

    pub fn target_platform(&self) -> TargetOs {
        self.target
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn sink(&self) -> &Arc<dyn PersistenceSink> {
        &self.sink
    }

    /// Compile and report the captured outcome instead of the raw triple.
    pub fn capture(
        &self,
        host: &dyn HostServices,
        info: &MethodInfo,
        flags: CompileFlags,
    ) -> FaultOutcome {
        FaultOutcome::from_output(&self.compile(host, info, flags))
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            capture_code: self.capture_code,
            process_name: self.process_name.clone(),
        }
    }
}

impl<C: Compiler> Compiler for CaptureCompiler<C> {
    fn compile(
        &self,
        host: &dyn HostServices,
        info: &MethodInfo,
        flags: CompileFlags,
    ) -> CompileOutput {
        let request = CompilationRequest::new(info.clone(), flags, self.target);
        let session =
            CaptureSession::begin(request, host, self.sink.as_ref(), self.session_options());
        tracing::trace!(id = %session.id(), method = %info.method, "capture started");

        if let Some(global) = &self.global {
            session.record_global_context(global.snapshot());
        }
        session.prime(&self.priming, info.method);

        let interceptor = session.interceptor();
        session.run(|| self.inner.compile(&interceptor, info, flags))
    }

    fn set_target_os(&mut self, os: TargetOs) {
        self.set_target_platform(os);
    }

    fn version_identifier(&self) -> Uuid {
        self.inner.version_identifier()
    }

    fn max_vector_width(&self, cpu: CpuFeatures) -> u32 {
        self.inner.max_vector_width(cpu)
    }

    fn process_shutdown(&self, host: &dyn HostServices) {
        self.inner.process_shutdown(host);
    }
}

fn current_process_name() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}
