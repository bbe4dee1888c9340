//! Process-wide configuration queries.
//!
//! Engines read configuration once at startup, outside any method. Those
//! answers still shape every later compile, so they are kept in a shared
//! [`GlobalContext`] and copied into each compilation record.

use std::sync::Arc;

use parking_lot::Mutex;

use super::call::{CallOrigin, HostCall, InterceptedCall};
use super::context::next_seq;
use crate::host::ConfigHost;

/// Append-only log of configuration calls shared across compiles.
#[derive(Debug, Default)]
pub struct GlobalContext {
    calls: Mutex<Vec<InterceptedCall>>,
}

impl GlobalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: HostCall) {
        let mut calls = self.calls.lock();
        let Ok(seq) = next_seq(calls.len()) else {
            tracing::warn!(query = call.query_name(), "global context full; call not recorded");
            return;
        };
        calls.push(InterceptedCall {
            seq,
            origin: CallOrigin::Global,
            call,
        });
    }

    /// Copy of every call recorded so far.
    pub fn snapshot(&self) -> Vec<InterceptedCall> {
        self.calls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`ConfigHost`] decorator that records every query into a [`GlobalContext`].
pub struct RecordingConfigHost<H> {
    inner: H,
    global: Arc<GlobalContext>,
}

impl<H: ConfigHost> RecordingConfigHost<H> {
    pub fn new(inner: H, global: Arc<GlobalContext>) -> Self {
        Self { inner, global }
    }

    pub fn global(&self) -> &Arc<GlobalContext> {
        &self.global
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: ConfigHost> ConfigHost for RecordingConfigHost<H> {
    fn get_int_config(&self, name: &str, default: i32) -> i32 {
        let answer = self.inner.get_int_config(name, default);
        self.global.record(HostCall::GetIntConfig {
            name: name.to_string(),
            default,
            answer,
        });
        answer
    }

    fn get_string_config(&self, name: &str) -> Option<String> {
        let answer = self.inner.get_string_config(name);
        self.global.record(HostCall::GetStringConfig {
            name: name.to_string(),
            answer: answer.clone(),
        });
        answer
    }
}
