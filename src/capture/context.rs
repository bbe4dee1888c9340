use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use super::call::{CallOrigin, HostCall, InterceptedCall};
use crate::compiler::{
    CompilationRequest, CompileFlags, CompileOutput, CompileResult, MethodInfo, TargetOs,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Request metadata already recorded")]
    MetadataAlreadyRecorded,
    #[error("Request metadata must be recorded before any call")]
    MissingMetadata,
    #[error("Request metadata recorded after {0} calls")]
    CallsAlreadyRecorded(usize),
    #[error("Context already finalized")]
    AlreadyFinalized,
    #[error("Context not finalized")]
    NotFinalized,
    #[error("Context already released")]
    Released,
    #[error("Call log is full at {0} entries")]
    SequenceExhausted(usize),
}

/// Tagged result of one compile attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultOutcome {
    Success { entry: u64, code_size: u32 },
    /// The engine returned an error code. Entry and size are kept as the
    /// engine reported them, which may be non-zero.
    Failure {
        result: CompileResult,
        #[serde(default)]
        entry: u64,
        #[serde(default)]
        code_size: u32,
    },
    Fault { signal: String },
}

impl FaultOutcome {
    pub fn from_output(output: &CompileOutput) -> Self {
        if output.result.is_ok() {
            FaultOutcome::Success {
                entry: output.entry,
                code_size: output.code_size,
            }
        } else {
            FaultOutcome::Failure {
                result: output.result,
                entry: output.entry,
                code_size: output.code_size,
            }
        }
    }

    /// Failure with no entry point or code, as most failing engines report.
    pub fn failure(result: CompileResult) -> Self {
        FaultOutcome::Failure {
            result,
            entry: 0,
            code_size: 0,
        }
    }

    /// Summarize a panic payload into a fault outcome.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        FaultOutcome::Fault {
            signal: panic_message(payload),
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, FaultOutcome::Fault { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultOutcome::Success { .. } => "success",
            FaultOutcome::Failure { .. } => "failure",
            FaultOutcome::Fault { .. } => "fault",
        }
    }
}

/// What was asked for, where, and by whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub method: MethodInfo,
    pub flags: CompileFlags,
    pub target: TargetOs,
    pub process_name: Option<String>,
    /// Hex SHA-256 of the method's IL bytes.
    pub il_sha256: String,
}

impl RequestMetadata {
    pub fn new(request: CompilationRequest, process_name: Option<String>) -> Self {
        let il_sha256 = hex_digest(&request.info.il_code);
        Self {
            method: request.info,
            flags: request.flags,
            target: request.target,
            process_name,
            il_sha256,
        }
    }
}

/// Per-invocation recording buffer.
///
/// Lifecycle: `record_request_metadata` exactly once and first, any number
/// of `append`s, then `finalize` exactly once. A finalized context rejects
/// every further mutation.
#[derive(Debug)]
pub struct CompilationContext {
    id: Uuid,
    started_at: DateTime<Utc>,
    metadata: Option<RequestMetadata>,
    global: Vec<InterceptedCall>,
    calls: Vec<InterceptedCall>,
    outcome: Option<FaultOutcome>,
    code: Option<Vec<u8>>,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at: Utc::now(),
            metadata: None,
            global: Vec::new(),
            calls: Vec::new(),
            outcome: None,
            code: None,
        }
    }

    pub fn record_request_metadata(
        &mut self,
        request: CompilationRequest,
        process_name: Option<String>,
    ) -> Result<(), ContextError> {
        self.ensure_open()?;
        if self.metadata.is_some() {
            return Err(ContextError::MetadataAlreadyRecorded);
        }
        if !self.calls.is_empty() {
            return Err(ContextError::CallsAlreadyRecorded(self.calls.len()));
        }
        self.metadata = Some(RequestMetadata::new(request, process_name));
        Ok(())
    }

    /// Attach a snapshot of process-wide calls made outside this compile.
    pub fn record_global_context(
        &mut self,
        calls: Vec<InterceptedCall>,
    ) -> Result<(), ContextError> {
        self.ensure_open()?;
        self.global = calls;
        Ok(())
    }

    /// Append a call to the log and return its sequence number.
    pub fn append(&mut self, origin: CallOrigin, call: HostCall) -> Result<u32, ContextError> {
        self.ensure_open()?;
        if self.metadata.is_none() {
            return Err(ContextError::MissingMetadata);
        }
        let seq = next_seq(self.calls.len())?;
        self.calls.push(InterceptedCall { seq, origin, call });
        Ok(seq)
    }

    /// Seal the context with its outcome and, for successful compiles, the
    /// generated code bytes.
    pub fn finalize(
        &mut self,
        outcome: FaultOutcome,
        code: Option<Vec<u8>>,
    ) -> Result<(), ContextError> {
        self.ensure_open()?;
        self.outcome = Some(outcome);
        self.code = code;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn metadata(&self) -> Option<&RequestMetadata> {
        self.metadata.as_ref()
    }

    pub fn calls(&self) -> &[InterceptedCall] {
        &self.calls
    }

    pub fn global_calls(&self) -> &[InterceptedCall] {
        &self.global
    }

    pub fn outcome(&self) -> Option<&FaultOutcome> {
        self.outcome.as_ref()
    }

    pub fn code(&self) -> Option<&[u8]> {
        self.code.as_deref()
    }

    fn ensure_open(&self) -> Result<(), ContextError> {
        if self.is_finalized() {
            Err(ContextError::AlreadyFinalized)
        } else {
            Ok(())
        }
    }
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequence number for the call appended after `len` others.
pub(crate) fn next_seq(len: usize) -> Result<u32, ContextError> {
    u32::try_from(len).map_err(|_| ContextError::SequenceExhausted(len))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
