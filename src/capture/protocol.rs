//! Crash-safe completion for one compile invocation.
//!
//! A [`CaptureSession`] owns the context of a single compile and walks it
//! through
//!
//! ```text
//! Created -> Primed -> Recording -> Completed | Faulted -> Persisted -> Released
//! ```
//!
//! The engine runs inside `catch_unwind`. Whatever way it exits, the
//! completion action finalizes the context with the best outcome known,
//! hands it to the sink, and releases it. A panic is re-raised only after
//! persistence has finished. Dropping a session that never completed runs
//! the same completion action with a fault outcome.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};

use uuid::Uuid;

use super::call::{CallOrigin, HostCall, InterceptedCall};
use super::context::{panic_message, CompilationContext, FaultOutcome};
use super::interceptor::InterceptingHost;
use super::priming::{PrimingReport, PrimingSet};
use crate::compiler::{CompilationRequest, CompileOutput};
use crate::host::{HostServices, MethodHandle};
use crate::sink::PersistenceSink;

/// Lifecycle state of a [`CaptureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapturePhase {
    Created,
    Primed,
    Recording,
    Completed,
    Faulted,
    Persisted,
    Released,
}

impl CapturePhase {
    fn rank(self) -> u8 {
        match self {
            CapturePhase::Created => 0,
            CapturePhase::Primed => 1,
            CapturePhase::Recording => 2,
            CapturePhase::Completed | CapturePhase::Faulted => 3,
            CapturePhase::Persisted => 4,
            CapturePhase::Released => 5,
        }
    }

    /// Phases only move forward; `Completed` and `Faulted` are alternatives.
    pub fn can_advance_to(self, next: CapturePhase) -> bool {
        next.rank() > self.rank()
    }
}

/// Per-session knobs taken from the capture configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Snapshot generated code bytes on success.
    pub capture_code: bool,
    /// Command line of the capturing process.
    pub process_name: Option<String>,
}

/// Recording state and completion protocol for one compile.
///
/// Single-threaded by construction: the context lives in a `RefCell` and the
/// interceptor borrows the session, so neither can leave the thread that
/// started the compile.
pub struct CaptureSession<'a> {
    id: Uuid,
    real: &'a dyn HostServices,
    sink: &'a dyn PersistenceSink,
    context: RefCell<Option<CompilationContext>>,
    phase: Cell<CapturePhase>,
    origin: Cell<CallOrigin>,
    capture_code: bool,
    /// Completion action has run.
    completed: Cell<bool>,
    /// The context reached the sink, by completion or by an early commit.
    persisted: Cell<bool>,
}

impl<'a> CaptureSession<'a> {
    /// Create the context for `request` and record its metadata.
    pub fn begin(
        request: CompilationRequest,
        real: &'a dyn HostServices,
        sink: &'a dyn PersistenceSink,
        options: SessionOptions,
    ) -> Self {
        let mut context = CompilationContext::new();
        let id = context.id();
        if let Err(err) = context.record_request_metadata(request, options.process_name) {
            tracing::error!(%id, error = %err, "failed to record request metadata");
        }
        Self {
            id,
            real,
            sink,
            context: RefCell::new(Some(context)),
            phase: Cell::new(CapturePhase::Created),
            origin: Cell::new(CallOrigin::Priming),
            capture_code: options.capture_code,
            completed: Cell::new(false),
            persisted: Cell::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase.get()
    }

    /// Whether the context has already been handed to the sink.
    pub fn is_persisted(&self) -> bool {
        self.persisted.get()
    }

    /// The host view to give the engine for this compile.
    pub fn interceptor(&self) -> InterceptingHost<'_> {
        InterceptingHost::new(self.real, self)
    }

    pub fn record_global_context(&self, calls: Vec<InterceptedCall>) {
        self.with_context(|ctx| {
            if let Err(err) = ctx.record_global_context(calls) {
                tracing::debug!(id = %self.id, error = %err, "global context not recorded");
            }
        });
    }

    /// Run the priming queries through the interceptor.
    pub fn prime(&self, set: &PrimingSet, method: MethodHandle) -> PrimingReport {
        self.origin.set(CallOrigin::Priming);
        let report = set.run(&self.interceptor(), method);
        if report.failed > 0 {
            tracing::debug!(
                id = %self.id,
                issued = report.issued,
                failed = report.failed,
                "priming finished with failures"
            );
        }
        self.advance(CapturePhase::Primed);
        report
    }

    /// Run the engine under the completion protocol.
    ///
    /// Returns the engine's output unchanged. If the engine panics, the
    /// context is persisted as a fault and the panic is resumed.
    pub fn run<F>(&self, compile: F) -> CompileOutput
    where
        F: FnOnce() -> CompileOutput,
    {
        self.origin.set(CallOrigin::Compiler);
        self.advance(CapturePhase::Recording);

        match panic::catch_unwind(AssertUnwindSafe(compile)) {
            Ok(output) => {
                self.complete(FaultOutcome::from_output(&output));
                output
            }
            Err(payload) => {
                let outcome = FaultOutcome::from_panic(payload.as_ref());
                tracing::warn!(
                    id = %self.id,
                    outcome = ?outcome,
                    "compile terminated abnormally; persisting before re-raising"
                );
                self.complete(outcome);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Finalize and persist now instead of at completion.
    ///
    /// Only accepted while the engine is running. Returns `true` if this call
    /// persisted the context. The completion action later sees the persisted
    /// flag and does nothing further.
    pub fn commit_early(&self, outcome: FaultOutcome) -> bool {
        if self.persisted.get() || self.completed.get() {
            return false;
        }
        let phase = self.phase.get();
        if phase != CapturePhase::Recording {
            tracing::debug!(id = %self.id, ?phase, "early commit outside the compile refused");
            return false;
        }
        self.seal(outcome);
        self.persist()
    }

    pub(crate) fn record(&self, call: HostCall) {
        let origin = self.origin.get();
        let Ok(mut slot) = self.context.try_borrow_mut() else {
            tracing::warn!(id = %self.id, query = call.query_name(), "context busy; call not recorded");
            return;
        };
        match slot.as_mut() {
            Some(ctx) => {
                if let Err(err) = ctx.append(origin, call) {
                    tracing::debug!(id = %self.id, error = %err, "call not recorded");
                }
            }
            None => {
                tracing::debug!(id = %self.id, query = call.query_name(), "call after release not recorded");
            }
        }
    }

    fn complete(&self, outcome: FaultOutcome) {
        if self.completed.replace(true) {
            return;
        }
        if self.persisted.get() {
            tracing::debug!(id = %self.id, "context already persisted; skipping completion");
        } else {
            self.seal(outcome);
            self.persist();
        }
        self.release();
    }

    fn seal(&self, outcome: FaultOutcome) {
        let next = if outcome.is_fault() {
            CapturePhase::Faulted
        } else {
            CapturePhase::Completed
        };
        let code = self.snapshot_code(&outcome);
        let sealed = self.with_context(|ctx| ctx.finalize(outcome, code));
        match sealed {
            Some(Ok(())) => self.advance(next),
            // A failed early persist leaves the context sealed for the retry.
            Some(Err(err)) => {
                tracing::debug!(id = %self.id, error = %err, "keeping earlier outcome")
            }
            None => {}
        }
    }

    fn persist(&self) -> bool {
        let result = self.with_context(|ctx| self.sink.append(ctx));
        match result {
            Some(Ok(())) => {
                self.persisted.set(true);
                self.advance(CapturePhase::Persisted);
                true
            }
            Some(Err(err)) => {
                tracing::error!(id = %self.id, error = %err, "failed to persist compilation context");
                false
            }
            None => false,
        }
    }

    fn release(&self) {
        if let Ok(mut slot) = self.context.try_borrow_mut() {
            slot.take();
        }
        self.advance(CapturePhase::Released);
    }

    fn snapshot_code(&self, outcome: &FaultOutcome) -> Option<Vec<u8>> {
        let &FaultOutcome::Success { entry, code_size } = outcome else {
            return None;
        };
        if !self.capture_code || code_size == 0 {
            return None;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.real.read_code(entry, code_size))) {
            Ok(code) => code,
            Err(payload) => {
                tracing::warn!(
                    id = %self.id,
                    signal = %panic_message(payload.as_ref()),
                    "host panicked while reading generated code"
                );
                None
            }
        }
    }

    fn with_context<T>(&self, f: impl FnOnce(&mut CompilationContext) -> T) -> Option<T> {
        let mut slot = self.context.try_borrow_mut().ok()?;
        slot.as_mut().map(f)
    }

    /// Move to `next`. A backward move is logged and ignored; it must never
    /// panic, since `run` calls this outside the guarded region.
    fn advance(&self, next: CapturePhase) {
        let current = self.phase.get();
        if !current.can_advance_to(next) {
            tracing::error!(id = %self.id, ?current, ?next, "illegal capture transition ignored");
            return;
        }
        self.phase.set(next);
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        if self.completed.get() {
            return;
        }
        let signal = if std::thread::panicking() {
            "capture abandoned while unwinding"
        } else {
            "capture dropped before the compile ran"
        };
        tracing::warn!(id = %self.id, signal, "capture session dropped without completing");
        self.complete(FaultOutcome::Fault {
            signal: signal.to_string(),
        });
    }
}
