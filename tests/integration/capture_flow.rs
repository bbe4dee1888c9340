//! Integration tests for the normal capture path
//!
//! Tests the flow: CaptureCompiler -> priming -> engine calls through the
//! interceptor -> finalized record in the sink.

use std::sync::Arc;

use proptest::prelude::*;
use tempfile::tempdir;

use jitcap::capture::{
    CallOrigin, CaptureCompiler, FaultOutcome, GlobalContext, HostCall, PrimingMode,
    RecordingConfigHost, WELL_KNOWN_BUILTINS,
};
use jitcap::compiler::mock::{CompileStep, ScriptedCompiler};
use jitcap::compiler::{CompileFlags, CompileOutput, CompileResult, Compiler, CpuFeatures};
use jitcap::config::CaptureConfig;
use jitcap::host::mock::MOCK_CODE_BASE;
use jitcap::host::{ClassAttribs, ConfigHost, HostError, HostServices};
use jitcap::sink::{read_artifact, JsonlArtifactWriter, MemorySink};
use jitcap::{MethodInfo, TargetOs};
use uuid::Uuid;

use super::common::*;

fn engine_calls(record: &jitcap::CompilationRecord) -> Vec<&HostCall> {
    record
        .calls
        .iter()
        .filter(|c| c.origin == CallOrigin::Compiler)
        .map(|c| &c.call)
        .collect()
}

/// Success with entry 0x1000 and 128 bytes of code.
#[test]
fn test_successful_compile_is_recorded_whole() {
    let mut code = vec![0x90; 127];
    code.push(0xc3);
    let (compiler, sink) = memory_capture(typical_steps(code.clone()));
    let host = program_host();

    let output = compiler.compile(&host, &method_info(MAIN), CompileFlags::default());

    assert_eq!(output, CompileOutput::success(0x1000, 128));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(
        record.outcome,
        FaultOutcome::Success {
            entry: 0x1000,
            code_size: 128
        }
    );
    assert_eq!(record.code.as_deref(), Some(code.as_slice()));
    assert_eq!(record.method.method, MAIN);
    assert_eq!(record.method_name().as_deref(), Some("App.Program:Main"));

    // 13 priming calls, then one per engine query (EmitCode is two).
    assert_eq!(record.calls.len(), 13 + 7);
    let names: Vec<&str> = engine_calls(record).iter().map(|c| c.query_name()).collect();
    assert_eq!(
        names,
        vec![
            "get_method_attribs",
            "get_method_class",
            "resolve_token",
            "get_field_offset",
            "alloc_mem",
            "write_code",
            "alloc_gc_info",
        ]
    );
    let seqs: Vec<u32> = record.calls.iter().map(|c| c.seq).collect();
    assert_eq!(seqs, (0..20).collect::<Vec<u32>>());
}

#[test]
fn test_priming_calls_come_first_and_cover_builtins() {
    let (compiler, sink) = memory_capture(typical_steps(vec![0xc3]));
    compiler.compile(&program_host(), &method_info(LENGTH), CompileFlags::default());

    let record = &sink.records()[0];
    let first_engine = record
        .calls
        .iter()
        .position(|c| c.origin == CallOrigin::Compiler)
        .expect("engine made calls");
    assert!(record.calls[..first_engine]
        .iter()
        .all(|c| c.origin == CallOrigin::Priming));
    assert!(record.calls[first_engine..]
        .iter()
        .all(|c| c.origin == CallOrigin::Compiler));

    let primed: Vec<_> = record.calls[..WELL_KNOWN_BUILTINS.len()]
        .iter()
        .map(|c| match &c.call {
            HostCall::GetBuiltinClass { id, answer } => {
                assert!(answer.is_some());
                *id
            }
            other => panic!("expected builtin lookup, got {other:?}"),
        })
        .collect();
    assert_eq!(primed, WELL_KNOWN_BUILTINS.to_vec());

    // The declaring type of Length is the value type App.Point.
    assert!(record.calls[..first_engine].iter().any(|c| matches!(
        &c.call,
        HostCall::IsValueClass { class, answer: Ok(true) } if *class == POINT
    )));
}

#[test]
fn test_priming_off_starts_with_the_first_engine_call() {
    let sink = Arc::new(MemorySink::new());
    let config = CaptureConfig {
        priming: PrimingMode::Off,
        ..CaptureConfig::default()
    };
    let compiler = capture_with(typical_steps(vec![0xc3]), sink.clone(), &config);
    compiler.compile(&program_host(), &method_info(MAIN), CompileFlags::default());

    let record = &sink.records()[0];
    assert_eq!(record.calls[0].seq, 0);
    assert_eq!(record.calls[0].origin, CallOrigin::Compiler);
    assert_eq!(record.calls[0].call.query_name(), "get_method_attribs");
}

#[test]
fn test_failure_result_is_a_captured_outcome() {
    let (compiler, sink) = memory_capture(vec![
        CompileStep::MethodName,
        CompileStep::Fail(CompileResult::BadCode),
        CompileStep::MethodClass,
    ]);

    let output = compiler.compile(&program_host(), &method_info(MAIN), CompileFlags::default());

    assert_eq!(output, CompileOutput::failure(CompileResult::BadCode));
    let record = &sink.records()[0];
    assert_eq!(record.outcome, FaultOutcome::failure(CompileResult::BadCode));
    assert_eq!(engine_calls(record).len(), 1);
    assert!(record.code.is_none());
}

#[test]
fn test_failure_keeps_entry_and_size_the_engine_reported() {
    let reported = CompileOutput {
        result: CompileResult::BadCode,
        entry: 0x2000,
        code_size: 16,
    };
    let dir = tempdir().unwrap();
    let path = dir.path().join("capture.jsonl");
    let writer = Arc::new(JsonlArtifactWriter::open(&path).unwrap());
    let compiler = capture_with(
        vec![CompileStep::MethodName, CompileStep::Return(reported)],
        writer,
        &CaptureConfig::default(),
    );

    let output = compiler.compile(&program_host(), &method_info(MAIN), CompileFlags::default());

    assert_eq!(output, reported);
    let records = read_artifact(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].outcome,
        FaultOutcome::Failure {
            result: CompileResult::BadCode,
            entry: 0x2000,
            code_size: 16,
        }
    );
    assert!(records[0].code.is_none());
}

#[test]
fn test_host_errors_pass_through_and_are_recorded() {
    let (compiler, sink) = memory_capture(vec![
        CompileStep::ResolveToken(0x0a00_0099),
        CompileStep::EmitCode(vec![0xc3]),
    ]);

    let output = compiler.compile(&program_host(), &method_info(MAIN), CompileFlags::default());
    assert!(output.result.is_ok());

    // The engine saw exactly the error the real host produced.
    let direct = program_host().resolve_token(MODULE, 0x0a00_0099);
    assert!(matches!(direct, Err(HostError::NotFound(_))));
    assert_eq!(compiler.inner().answers()[0], format!("{direct:?}"));

    let record = &sink.records()[0];
    match engine_calls(record)[0] {
        HostCall::ResolveToken { token, answer, .. } => {
            assert_eq!(*token, 0x0a00_0099);
            assert_eq!(answer, &direct);
        }
        other => panic!("expected resolve_token, got {other:?}"),
    }
}

#[test]
fn test_repeated_queries_are_not_deduplicated() {
    let (compiler, sink) = memory_capture(vec![
        CompileStep::ClassSize(POINT),
        CompileStep::ClassSize(POINT),
        CompileStep::ClassSize(POINT),
        CompileStep::EmitCode(vec![0xc3]),
    ]);
    let host = program_host();
    compiler.compile(&host, &method_info(LENGTH), CompileFlags::default());

    let sizes = engine_calls(&sink.records()[0])
        .into_iter()
        .filter(|c| c.query_name() == "get_class_size")
        .count();
    assert_eq!(sizes, 3);
}

/// Engine that watches a class change while it compiles.
struct LoadingCompiler<'h> {
    runtime: &'h jitcap::host::mock::MockHost,
}

impl Compiler for LoadingCompiler<'_> {
    fn compile(
        &self,
        host: &dyn HostServices,
        _info: &MethodInfo,
        _flags: CompileFlags,
    ) -> CompileOutput {
        let before = host.get_class_attribs(POINT);
        self.runtime
            .set_class_attribs(POINT, ClassAttribs(ClassAttribs::VALUE_CLASS));
        let after = host.get_class_attribs(POINT);
        assert_ne!(before, after);
        CompileOutput::failure(CompileResult::Skipped)
    }

    fn set_target_os(&mut self, _os: TargetOs) {}

    fn version_identifier(&self) -> Uuid {
        Uuid::nil()
    }

    fn max_vector_width(&self, _cpu: CpuFeatures) -> u32 {
        16
    }

    fn process_shutdown(&self, _host: &dyn HostServices) {}
}

#[test]
fn test_answers_are_captured_at_call_time() {
    let host = program_host();
    let sink = Arc::new(MemorySink::new());
    let config = CaptureConfig {
        priming: PrimingMode::Off,
        ..CaptureConfig::default()
    };
    let compiler = CaptureCompiler::new(LoadingCompiler { runtime: &host }, sink.clone(), &config);

    compiler.compile(&host, &method_info(LENGTH), CompileFlags::default());

    let answers: Vec<_> = sink.records()[0]
        .calls
        .iter()
        .map(|c| match &c.call {
            HostCall::GetClassAttribs { answer, .. } => answer.clone(),
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(
        answers,
        vec![
            Ok(ClassAttribs(ClassAttribs::VALUE_CLASS | ClassAttribs::SEALED)),
            Ok(ClassAttribs(ClassAttribs::VALUE_CLASS)),
        ]
    );
}

#[test]
fn test_global_context_is_copied_into_each_record() {
    let global = Arc::new(GlobalContext::new());
    let config_host = RecordingConfigHost::new(program_host(), global.clone());
    assert_eq!(config_host.get_int_config("TieredCompilation", 1), 0);
    assert_eq!(config_host.get_string_config("JitDisasm"), None);

    let (compiler, sink) = memory_capture(typical_steps(vec![0xc3]));
    let compiler = compiler.with_global_context(global);
    let host = config_host.into_inner();
    compiler.compile(&host, &method_info(MAIN), CompileFlags::default());
    compiler.compile(&host, &method_info(LENGTH), CompileFlags::default());

    for record in sink.records() {
        assert_eq!(record.global.len(), 2);
        assert!(record.global.iter().all(|c| c.origin == CallOrigin::Global));
        // The per-method log still starts with priming.
        assert_eq!(record.calls[0].origin, CallOrigin::Priming);
    }
}

#[test]
fn test_jsonl_artifact_end_to_end() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("captures").join("capture.jsonl");
    let writer = Arc::new(JsonlArtifactWriter::open(&path).unwrap());

    let mut compiler = CaptureCompiler::new(
        ScriptedCompiler::new(typical_steps(vec![0x55, 0xc3])),
        writer.clone(),
        &CaptureConfig::default(),
    );
    compiler.set_target_platform(TargetOs::Windows);
    let host = program_host();
    compiler.compile(&host, &method_info(MAIN), CompileFlags(CompileFlags::TIER0));
    compiler.compile(&host, &method_info(LENGTH), CompileFlags(CompileFlags::TIER1));

    assert_eq!(writer.records_written(), 2);
    let records = read_artifact(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.target == TargetOs::Windows));
    assert_eq!(records[0].flags, CompileFlags(CompileFlags::TIER0));
    assert_eq!(records[1].method_name().as_deref(), Some("App.Point:Length"));
    assert_eq!(records[0].il_sha256, records[1].il_sha256);
    assert_ne!(records[0].id, records[1].id);
    let entry = match records[1].outcome {
        FaultOutcome::Success { entry, .. } => entry,
        ref other => panic!("expected success, got {other:?}"),
    };
    assert!(entry > MOCK_CODE_BASE);
}

#[test]
fn test_code_capture_can_be_disabled() {
    let sink = Arc::new(MemorySink::new());
    let config = CaptureConfig {
        capture_code: false,
        ..CaptureConfig::default()
    };
    let compiler = capture_with(typical_steps(vec![0xc3]), sink.clone(), &config);
    compiler.compile(&program_host(), &method_info(MAIN), CompileFlags::default());
    let record = &sink.records()[0];
    assert!(!record.outcome.is_fault());
    assert!(record.code.is_none());
}

fn query_step() -> impl Strategy<Value = CompileStep> {
    prop_oneof![
        Just(CompileStep::MethodClass),
        Just(CompileStep::MethodName),
        Just(CompileStep::MethodAttribs),
        Just(CompileStep::ClassSize(POINT)),
        Just(CompileStep::ClassName(PROGRAM)),
        Just(CompileStep::ResolveToken(POINT_X_TOKEN)),
        Just(CompileStep::ResolveToken(0x0a00_0001)),
        Just(CompileStep::FieldOffset(POINT_X)),
        Just(CompileStep::AllocGcInfo(4)),
    ]
}

fn step_query(step: &CompileStep) -> &'static str {
    match step {
        CompileStep::MethodClass => "get_method_class",
        CompileStep::MethodName => "get_method_name",
        CompileStep::MethodAttribs => "get_method_attribs",
        CompileStep::ClassSize(_) => "get_class_size",
        CompileStep::ClassName(_) => "get_class_name",
        CompileStep::ResolveToken(_) => "resolve_token",
        CompileStep::FieldOffset(_) => "get_field_offset",
        CompileStep::AllocGcInfo(_) => "alloc_gc_info",
        other => unreachable!("not generated: {other:?}"),
    }
}

proptest! {
    #[test]
    fn prop_engine_calls_are_logged_in_order_without_dedup(
        steps in prop::collection::vec(query_step(), 0..40)
    ) {
        let expected: Vec<&str> = steps.iter().map(step_query).collect();
        let (compiler, sink) = memory_capture(steps);
        let host = program_host();
        compiler.compile(&host, &method_info(MAIN), CompileFlags::default());

        let records = sink.records();
        prop_assert_eq!(records.len(), 1);
        let logged: Vec<&str> = engine_calls(&records[0])
            .iter()
            .map(|c| c.query_name())
            .collect();
        prop_assert_eq!(logged, expected);
        prop_assert_eq!(host.query_count(), records[0].calls.len());
        for (i, call) in records[0].calls.iter().enumerate() {
            prop_assert_eq!(call.seq as usize, i);
        }
    }
}
