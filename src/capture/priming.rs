//! Well-known queries forced into every capture.
//!
//! Some replay consumers need these answers whether or not the engine
//! asked for them on this particular compile, so they are issued through
//! the interceptor before the engine starts. Failures here are logged and
//! counted, never propagated.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use super::context::panic_message;
use crate::host::{BuiltinClass, HostError, HostServices, MethodHandle};

/// Builtin classes looked up on every capture, in this order.
pub const WELL_KNOWN_BUILTINS: [BuiltinClass; 7] = [
    BuiltinClass::Object,
    BuiltinClass::TypedByRef,
    BuiltinClass::TypeHandle,
    BuiltinClass::FieldHandle,
    BuiltinClass::MethodHandle,
    BuiltinClass::String,
    BuiltinClass::RuntimeType,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimingMode {
    /// Builtins plus the method's declaring type and name.
    #[default]
    Full,
    /// Builtins only.
    Builtins,
    Off,
}

impl PrimingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimingMode::Full => "full",
            PrimingMode::Builtins => "builtins",
            PrimingMode::Off => "off",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Some(PrimingMode::Full),
            "builtins" => Some(PrimingMode::Builtins),
            "off" | "none" => Some(PrimingMode::Off),
            _ => None,
        }
    }
}

/// Counts from one priming pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrimingReport {
    pub issued: usize,
    pub failed: usize,
}

/// The fixed set of queries issued before each compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimingSet {
    builtins: &'static [BuiltinClass],
    declaring_type: bool,
}

impl PrimingSet {
    pub fn for_mode(mode: PrimingMode) -> Self {
        match mode {
            PrimingMode::Full => Self {
                builtins: &WELL_KNOWN_BUILTINS,
                declaring_type: true,
            },
            PrimingMode::Builtins => Self {
                builtins: &WELL_KNOWN_BUILTINS,
                declaring_type: false,
            },
            PrimingMode::Off => Self {
                builtins: &[],
                declaring_type: false,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty() && !self.declaring_type
    }

    /// Issue every priming query against `host` for `method`.
    pub fn run(&self, host: &dyn HostServices, method: MethodHandle) -> PrimingReport {
        let mut report = PrimingReport::default();

        for &id in self.builtins {
            attempt(&mut report, "get_builtin_class", || {
                host.get_builtin_class(id)
                    .ok_or_else(|| HostError::NotFound(id.as_str().to_string()))
            });
        }

        if self.declaring_type {
            if let Some(class) =
                attempt(&mut report, "get_method_class", || host.get_method_class(method))
            {
                attempt(&mut report, "get_class_attribs", || {
                    host.get_class_attribs(class)
                });
                attempt(&mut report, "get_class_name", || host.get_class_name(class));
                attempt(&mut report, "is_value_class", || host.is_value_class(class));
                attempt(&mut report, "as_cor_info_type", || {
                    host.as_cor_info_type(class)
                });
            }
            attempt(&mut report, "get_method_name", || host.get_method_name(method));
        }

        report
    }
}

impl Default for PrimingSet {
    fn default() -> Self {
        Self::for_mode(PrimingMode::default())
    }
}

fn attempt<T>(
    report: &mut PrimingReport,
    query: &'static str,
    f: impl FnOnce() -> Result<T, HostError>,
) -> Option<T> {
    report.issued += 1;
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(answer)) => Some(answer),
        Ok(Err(err)) => {
            report.failed += 1;
            tracing::debug!(query, error = %err, "priming query failed");
            None
        }
        Err(payload) => {
            report.failed += 1;
            tracing::warn!(
                query,
                signal = %panic_message(payload.as_ref()),
                "priming query panicked"
            );
            None
        }
    }
}
