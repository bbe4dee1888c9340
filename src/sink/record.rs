use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::{CompilationContext, ContextError, FaultOutcome, HostCall, InterceptedCall};
use crate::compiler::{CompileFlags, MethodInfo, TargetOs};

pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// One self-contained, independently replayable compilation.
///
/// This is the persisted form of a finalized [`CompilationContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationRecord {
    pub schema_version: u32,
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub process_name: Option<String>,
    pub target: TargetOs,
    pub flags: CompileFlags,
    pub method: MethodInfo,
    pub il_sha256: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global: Vec<InterceptedCall>,
    pub calls: Vec<InterceptedCall>,
    pub outcome: FaultOutcome,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes::option"
    )]
    pub code: Option<Vec<u8>>,
}

impl CompilationRecord {
    pub fn from_context(context: &CompilationContext) -> Result<Self, ContextError> {
        let outcome = context.outcome().ok_or(ContextError::NotFinalized)?.clone();
        let metadata = context.metadata().ok_or(ContextError::MissingMetadata)?;
        Ok(Self {
            schema_version: RECORD_SCHEMA_VERSION,
            id: context.id(),
            recorded_at: context.started_at(),
            process_name: metadata.process_name.clone(),
            target: metadata.target,
            flags: metadata.flags,
            method: metadata.method.clone(),
            il_sha256: metadata.il_sha256.clone(),
            global: context.global_calls().to_vec(),
            calls: context.calls().to_vec(),
            outcome,
            code: context.code().map(<[u8]>::to_vec),
        })
    }

    /// Name of the method from the first successful `get_method_name`
    /// answer for the compiled method, if one was recorded.
    pub fn method_name(&self) -> Option<String> {
        self.calls.iter().find_map(|c| match &c.call {
            HostCall::GetMethodName {
                method,
                answer: Ok(name),
            } if *method == self.method.method => Some(match &name.class_name {
                Some(class) => format!("{class}:{}", name.name),
                None => name.name.clone(),
            }),
            _ => None,
        })
    }
}

/// Serde adapter storing byte payloads as standard base64 strings.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|encoded| STANDARD.decode(encoded.as_bytes()))
                .transpose()
                .map_err(serde::de::Error::custom)
        }
    }
}
