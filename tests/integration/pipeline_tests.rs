/*!
 * End-to-end pipeline tests with mock adapters.
 *
 * These tests run the full orchestrator over parsed inputs and assert on the
 * assembled timeline and written bundle, without any external API calls.
 */

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::common;
use crate::common::mock_adapters::{
    MockAudio, MockBgm, MockErrorType, MockImage, MockStock, mock_adapter_set,
};
use scriptreel::app_config::{OutputMode, StockUnit};
use scriptreel::file_utils::FileManager;
use scriptreel::pipeline::{EntryStatus, JobKind, PipelineOrchestrator};
use scriptreel::prompt_parser::PromptBlockParser;
use scriptreel::script_parser::ScriptParser;

/// Test a fully successful run in bundle mode
#[tokio::test]
async fn test_run_withAllStagesSucceeding_shouldWriteCompleteBundle() {
    let temp_dir = common::create_temp_dir().expect("temp dir");
    let run_dir = temp_dir.path().join("run");

    let utterances = ScriptParser::parse(common::sample_script()).expect("script");
    let scenes = PromptBlockParser::parse(common::sample_prompts()).expect("prompts");
    assert_eq!(utterances.len(), 3);
    assert_eq!(scenes.len(), 3);

    let audio = MockAudio::new().with_duration(0, 5.0).with_duration(1, 3.0).with_duration(2, 4.0);
    let adapters = mock_adapter_set(audio, MockImage::new(), MockBgm::new(), MockStock::new());

    let orchestrator = PipelineOrchestrator::new(common::test_config(), adapters);
    let outcome = orchestrator.run(&utterances, &scenes, &run_dir).await.expect("run");

    assert!(outcome.all_ok);
    assert!(outcome.failed_units.is_empty());
    assert_eq!(outcome.timeline.total_duration, Duration::from_secs(12));

    // 3 audio + 3 image + 1 bgm rows, all ok
    assert_eq!(outcome.timeline.status_counts(), (7, 0, 0));

    // Audio rows are back to back in script order
    let audio_rows: Vec<_> =
        outcome.timeline.entries.iter().filter(|e| e.kind == JobKind::Audio).collect();
    assert_eq!(audio_rows[0].start_time, Duration::from_secs(0));
    assert_eq!(audio_rows[1].start_time, Duration::from_secs(5));
    assert_eq!(audio_rows[2].start_time, Duration::from_secs(8));

    // Every ok row points at a file that exists
    for entry in &outcome.timeline.entries {
        let path = entry.artifact_path.as_ref().expect("ok row should carry a path");
        assert!(FileManager::file_exists(path), "missing artifact {:?}", path);
    }

    // The bundle table was written
    let table = std::fs::read_to_string(run_dir.join("timeline.csv")).expect("timeline.csv");
    assert!(table.starts_with("sequence_index,kind,start_time,end_time,artifact_path,status"));
    assert_eq!(table.lines().count(), 1 + 7);
}

/// Test one permanently failing unit does not abort the run
#[tokio::test]
async fn test_run_withOnePermanentAudioFailure_shouldKeepOtherRows() {
    let temp_dir = common::create_temp_dir().expect("temp dir");
    let run_dir = temp_dir.path().join("run");

    let utterances = ScriptParser::parse(common::sample_script()).expect("script");

    let audio = MockAudio::new();
    let audio_controller = audio.controller();
    audio_controller.fail_next(1, 1, MockErrorType::Permanent);

    let mut config = common::test_config();
    config.image.enabled = false;
    config.bgm.enabled = false;

    let adapters = mock_adapter_set(audio, MockImage::new(), MockBgm::new(), MockStock::new());
    let orchestrator = PipelineOrchestrator::new(config, adapters);
    let outcome = orchestrator.run(&utterances, &[], &run_dir).await.expect("run");

    assert!(!outcome.all_ok);
    assert_eq!(outcome.failed_units.len(), 1);
    assert_eq!(outcome.failed_units[0].sequence_index, 1);
    assert_eq!(outcome.failed_units[0].kind, JobKind::Audio);

    // The failed row keeps its place between the successes
    let statuses: Vec<EntryStatus> =
        outcome.timeline.entries.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![EntryStatus::Ok, EntryStatus::Failed, EntryStatus::Ok]);
    assert!(outcome.timeline.entries[1].artifact_path.is_none());

    // A permanent failure consumes exactly one attempt
    assert_eq!(audio_controller.calls_for(1), 1);
}

/// Test transient failures are retried until they clear
#[tokio::test]
async fn test_run_withTransientAudioFailures_shouldRetryAndSucceed() {
    let temp_dir = common::create_temp_dir().expect("temp dir");
    let run_dir = temp_dir.path().join("run");

    let utterances = ScriptParser::parse("speaker1: only line").expect("script");

    let audio = MockAudio::new();
    let audio_controller = audio.controller();
    // Two retryable failures, then success on the third attempt
    audio_controller.fail_next(0, 2, MockErrorType::Transient);

    let mut config = common::test_config();
    config.image.enabled = false;
    config.bgm.enabled = false;

    let adapters = mock_adapter_set(audio, MockImage::new(), MockBgm::new(), MockStock::new());
    let orchestrator = PipelineOrchestrator::new(config, adapters);
    let outcome = orchestrator.run(&utterances, &[], &run_dir).await.expect("run");

    assert!(outcome.all_ok);
    assert_eq!(audio_controller.calls_for(0), 3);
}

/// Test the BGM request is sized to the fallback-inclusive narration total
#[tokio::test]
async fn test_run_withFailedAudioSlot_shouldSizeBgmWithFallbackWindow() {
    let temp_dir = common::create_temp_dir().expect("temp dir");
    let run_dir = temp_dir.path().join("run");

    let utterances = ScriptParser::parse(common::sample_script()).expect("script");

    // Measured 2s per line, but line 1 fails and is credited the 5s fallback
    let audio = MockAudio::new();
    audio.controller().fail_next(1, 1, MockErrorType::Permanent);
    let bgm = MockBgm::new();
    let bgm_target = bgm.last_target();

    let mut config = common::test_config();
    config.image.enabled = false;

    let adapters = mock_adapter_set(audio, MockImage::new(), bgm, MockStock::new());
    let orchestrator = PipelineOrchestrator::new(config, adapters);
    let outcome = orchestrator.run(&utterances, &[], &run_dir).await.expect("run");

    assert_eq!(outcome.timeline.total_duration, Duration::from_secs(9));
    assert_eq!(*bgm_target.lock().unwrap(), Some(Duration::from_secs(9)));
}

/// Test cancellation before dispatch yields skipped rows, not failures
#[tokio::test]
async fn test_run_withCancellationBeforeDispatch_shouldSkipEveryUnit() {
    let temp_dir = common::create_temp_dir().expect("temp dir");
    let run_dir = temp_dir.path().join("run");

    let utterances = ScriptParser::parse(common::sample_script()).expect("script");
    let scenes = PromptBlockParser::parse(common::sample_prompts()).expect("prompts");

    let adapters = mock_adapter_set(
        MockAudio::new(),
        MockImage::new(),
        MockBgm::new(),
        MockStock::new(),
    );
    let orchestrator = PipelineOrchestrator::new(common::test_config(), adapters);
    orchestrator.cancel_handle().store(true, Ordering::SeqCst);

    let outcome = orchestrator.run(&utterances, &scenes, &run_dir).await.expect("run");

    assert!(!outcome.all_ok);
    // Nothing failed; everything was skipped
    assert!(outcome.failed_units.is_empty());
    let (ok, failed, skipped) = outcome.timeline.status_counts();
    assert_eq!((ok, failed), (0, 0));
    assert_eq!(skipped, 7);
    // Skipped audio slots are still credited the fallback window
    assert_eq!(outcome.timeline.total_duration, Duration::from_secs(15));
}

/// Test render mode writes a manifest instead of the bundle table
#[tokio::test]
async fn test_run_withRenderMode_shouldWriteManifest() {
    let temp_dir = common::create_temp_dir().expect("temp dir");
    let run_dir = temp_dir.path().join("run");

    let utterances = ScriptParser::parse(common::sample_script()).expect("script");
    let scenes = PromptBlockParser::parse(common::sample_prompts()).expect("prompts");

    let mut config = common::test_config();
    config.output_mode = OutputMode::Render;

    let adapters = mock_adapter_set(
        MockAudio::new(),
        MockImage::new(),
        MockBgm::new(),
        MockStock::new(),
    );
    let orchestrator = PipelineOrchestrator::new(config, adapters);
    let outcome = orchestrator.run(&utterances, &scenes, &run_dir).await.expect("run");
    assert!(outcome.all_ok);

    assert!(!run_dir.join("timeline.csv").exists());
    let manifest: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(run_dir.join("render_manifest.json")).expect("manifest"),
    )
    .expect("manifest should be valid JSON");

    assert_eq!(manifest["total_duration"].as_f64(), Some(6.0));
    let formats = manifest["formats"].as_array().expect("formats");
    assert_eq!(formats.len(), 2);
    assert_eq!(formats[0]["width"].as_u64(), Some(1920));
    let rows = manifest["timeline"].as_array().expect("timeline rows");
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0]["kind"].as_str(), Some("audio"));
}

/// Test the stock stage runs its configured units
#[tokio::test]
async fn test_run_withStockUnits_shouldPlaceClipsOnSceneWindows() {
    let temp_dir = common::create_temp_dir().expect("temp dir");
    let run_dir = temp_dir.path().join("run");

    let utterances = ScriptParser::parse(common::sample_script()).expect("script");
    let scenes = PromptBlockParser::parse(common::sample_prompts()).expect("prompts");

    let mut config = common::test_config();
    config.stock.enabled = true;
    config.stock.units =
        vec![StockUnit { scene_index: 2, query: "office meeting".to_string() }];

    let stock = MockStock::new();
    let stock_controller = stock.controller();

    let adapters = mock_adapter_set(MockAudio::new(), MockImage::new(), MockBgm::new(), stock);
    let orchestrator = PipelineOrchestrator::new(config, adapters);
    let outcome = orchestrator.run(&utterances, &scenes, &run_dir).await.expect("run");

    assert!(outcome.all_ok);
    assert_eq!(stock_controller.call_count(), 1);

    let stock_row = outcome
        .timeline
        .entries
        .iter()
        .find(|e| e.kind == JobKind::Stock)
        .expect("stock row");
    assert_eq!(stock_row.sequence_index, 2);
    // Scene 2 spans 0:15-0:30
    assert_eq!(stock_row.start_time, Duration::from_secs(15));
    assert_eq!(stock_row.end_time, Duration::from_secs(30));
}

/// Test progress callbacks observe every completed unit
#[tokio::test]
async fn test_run_withProgressCallback_shouldReportEveryCompletion() {
    let temp_dir = common::create_temp_dir().expect("temp dir");
    let run_dir = temp_dir.path().join("run");

    let utterances = ScriptParser::parse(common::sample_script()).expect("script");

    let mut config = common::test_config();
    config.image.enabled = false;

    let reports = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = reports.clone();

    let adapters = mock_adapter_set(
        MockAudio::new(),
        MockImage::new(),
        MockBgm::new(),
        MockStock::new(),
    );
    let orchestrator = PipelineOrchestrator::new(config, adapters).with_progress(Arc::new(
        move |kind, completed, total| {
            sink.lock().unwrap().push((kind, completed, total));
        },
    ));
    orchestrator.run(&utterances, &[], &run_dir).await.expect("run");

    let reports = reports.lock().unwrap();
    let audio_reports: Vec<_> =
        reports.iter().filter(|(kind, _, _)| *kind == JobKind::Audio).collect();
    assert_eq!(audio_reports.len(), 3);
    assert!(audio_reports.iter().all(|(_, _, total)| *total == 3));
    assert!(reports.contains(&(JobKind::Bgm, 1, 1)));
}
