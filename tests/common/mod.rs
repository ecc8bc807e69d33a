/*!
 * Common test utilities for the scriptreel test suite
 */

use anyhow::Result;
use tempfile::TempDir;

// Re-export the mock adapters module
pub mod mock_adapters;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// A small two-speaker script with stage directions and a ruby annotation
pub fn sample_script() -> &'static str {
    r#"# intro
speaker1: まず{DSCR|ディーエスシーアール}について説明します。
speaker2: (ため息をついて) よろしくお願いします！

speaker1: 今日はここまでです。
"#
}

/// A matching prompt block with three timed scenes
pub fn sample_prompts() -> &'static str {
    r#"[1] 0:00-0:15 | 落ち着いたオフィスで話す男性キャラクター
[2] 0:15-0:30 | 驚いた表情の女性キャラクター
[3] 0:30-1:00 | ホワイトボードに図を描く手元
"#
}

/// A config with every credential filled in, so validation passes
pub fn test_config() -> scriptreel::Config {
    let mut config = scriptreel::Config::default();
    config.audio.api_key = "test-audio-key".to_string();
    config.image.api_key = "test-image-key".to_string();
    config.bgm.api_key = "test-bgm-key".to_string();
    config.stock.api_key = "test-stock-key".to_string();
    // Keep test runs fast: tiny backoffs, generous timeout
    config.retry.backoff_base_ms = 5;
    config.retry.backoff_max_ms = 20;
    config
}
