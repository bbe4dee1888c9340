//! Integration tests for concurrent compiles sharing one facade and sink

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tempfile::tempdir;

use jitcap::capture::{CallOrigin, HostCall};
use jitcap::compiler::mock::CompileStep;
use jitcap::compiler::{CompileFlags, Compiler};
use jitcap::config::CaptureConfig;
use jitcap::host::MethodHandle;
use jitcap::sink::{read_artifact, ArtifactReader, JsonlArtifactWriter};
use jitcap::CompilationRecord;

use super::common::*;

/// Method handle a recorded call refers to, for calls that carry one.
fn call_method(call: &HostCall) -> Option<MethodHandle> {
    match call {
        HostCall::GetMethodClass { method, .. }
        | HostCall::GetMethodName { method, .. }
        | HostCall::GetMethodAttribs { method, .. } => Some(*method),
        _ => None,
    }
}

fn assert_only_own_method(record: &CompilationRecord) {
    for call in &record.calls {
        if let Some(method) = call_method(&call.call) {
            assert_eq!(
                method, record.method.method,
                "record {} contains a call for another method",
                record.id
            );
        }
    }
}

/// Two compiles on two threads.
#[test]
fn test_two_concurrent_compiles_are_independent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("capture.jsonl");
    let writer = Arc::new(JsonlArtifactWriter::open(&path).unwrap());
    let compiler = capture_with(
        vec![
            CompileStep::MethodAttribs,
            CompileStep::MethodName,
            CompileStep::EmitCode(vec![0xc3]),
        ],
        writer.clone(),
        &CaptureConfig::default(),
    );
    let host = program_host();

    thread::scope(|s| {
        for method in [MAIN, LENGTH] {
            let compiler = &compiler;
            let host = &host;
            s.spawn(move || {
                let output = compiler.compile(host, &method_info(method), CompileFlags::default());
                assert!(output.result.is_ok());
            });
        }
    });

    let records = read_artifact(&path).unwrap();
    assert_eq!(records.len(), 2);
    let methods: HashSet<MethodHandle> = records.iter().map(|r| r.method.method).collect();
    assert_eq!(methods, HashSet::from([MAIN, LENGTH]));

    for record in &records {
        assert_only_own_method(record);
        let engine: Vec<&str> = record
            .calls
            .iter()
            .filter(|c| c.origin == CallOrigin::Compiler)
            .map(|c| c.call.query_name())
            .collect();
        assert_eq!(
            engine,
            vec!["get_method_attribs", "get_method_name", "alloc_mem", "write_code"]
        );
    }
}

#[test]
fn test_many_threads_produce_one_whole_line_each() {
    const THREADS: u64 = 16;
    const PER_THREAD: u64 = 8;

    let dir = tempdir().unwrap();
    let path = dir.path().join("capture.jsonl");
    let writer = Arc::new(JsonlArtifactWriter::open(&path).unwrap());
    let compiler = capture_with(
        vec![
            CompileStep::MethodClass,
            CompileStep::MethodName,
            CompileStep::MethodAttribs,
            // Large enough that interleaved writes would be visible.
            CompileStep::EmitCode(vec![0x90; 4096]),
        ],
        writer.clone(),
        &CaptureConfig::default(),
    );
    let host = many_methods_host(THREADS * PER_THREAD);

    thread::scope(|s| {
        for t in 0..THREADS {
            let compiler = &compiler;
            let host = &host;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let method = MethodHandle(0x100 + t * PER_THREAD + i);
                    compiler.compile(host, &method_info(method), CompileFlags::default());
                }
            });
        }
    });

    assert_eq!(writer.records_written(), THREADS * PER_THREAD);
    let records: Vec<CompilationRecord> = ArtifactReader::open(&path)
        .unwrap()
        .collect::<Result<_, _>>()
        .expect("every line parses on its own");
    assert_eq!(records.len() as u64, THREADS * PER_THREAD);

    let methods: HashSet<MethodHandle> = records.iter().map(|r| r.method.method).collect();
    assert_eq!(methods.len() as u64, THREADS * PER_THREAD);
    let ids: HashSet<_> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), records.len());

    for record in &records {
        assert_only_own_method(record);
        assert_eq!(record.code.as_ref().map(Vec::len), Some(4096));
    }
}

#[test]
fn test_faulting_threads_do_not_disturb_others() {
    let (crashing, sink) = memory_capture(vec![
        CompileStep::MethodName,
        CompileStep::Panic("worker crash".into()),
    ]);
    let healthy = capture_with(
        vec![CompileStep::MethodName, CompileStep::EmitCode(vec![0xc3])],
        sink.clone(),
        &CaptureConfig::default(),
    );
    let host = program_host();

    thread::scope(|s| {
        for (i, method) in [MAIN, LENGTH, MAIN, LENGTH].into_iter().enumerate() {
            let host = &host;
            let crashing = &crashing;
            let healthy = &healthy;
            s.spawn(move || {
                let info = method_info(method);
                if i % 2 == 0 {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        crashing.compile(host, &info, CompileFlags::default())
                    }));
                    assert!(result.is_err());
                } else {
                    healthy.compile(host, &info, CompileFlags::default());
                }
            });
        }
    });

    let records = sink.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records.iter().filter(|r| r.outcome.is_fault()).count(), 2);
    for record in &records {
        assert_only_own_method(record);
        if record.outcome.is_fault() {
            assert_eq!(record.method.method, MAIN);
        } else {
            assert_eq!(record.method.method, LENGTH);
        }
    }
}
