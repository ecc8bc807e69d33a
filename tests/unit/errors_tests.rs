/*!
 * Tests for error classification
 */

use std::time::Duration;

use scriptreel::errors::{AdapterError, AdapterFamily, AppError, ConfigError, ParseError};

/// Test retryability classification
#[test]
fn test_isRetryable_withEachErrorClass_shouldClassifyCorrectly() {
    let transient = AdapterError::transient(AdapterFamily::Audio, "socket closed");
    let permanent = AdapterError::permanent(AdapterFamily::Audio, "invalid key");
    let rate_limited = AdapterError::rate_limited(AdapterFamily::Image, "quota", None);
    let timeout =
        AdapterError::Timeout { family: AdapterFamily::Bgm, after: Duration::from_secs(120) };

    assert!(transient.is_retryable());
    assert!(rate_limited.is_retryable());
    assert!(timeout.is_retryable());
    assert!(!permanent.is_retryable());
}

/// Test the suggested wait is only carried by rate limits
#[test]
fn test_retryAfter_withRateLimit_shouldCarrySuggestedWait() {
    let with_wait = AdapterError::rate_limited(
        AdapterFamily::Stock,
        "quota",
        Some(Duration::from_secs(30)),
    );
    let without_wait = AdapterError::rate_limited(AdapterFamily::Stock, "quota", None);
    let transient = AdapterError::transient(AdapterFamily::Stock, "5xx");

    assert_eq!(with_wait.retry_after(), Some(Duration::from_secs(30)));
    assert_eq!(without_wait.retry_after(), None);
    assert_eq!(transient.retry_after(), None);
}

/// Test the family accessor
#[test]
fn test_family_withEachVariant_shouldReturnOwningFamily() {
    assert_eq!(
        AdapterError::transient(AdapterFamily::Audio, "x").family(),
        AdapterFamily::Audio
    );
    assert_eq!(
        AdapterError::permanent(AdapterFamily::Image, "x").family(),
        AdapterFamily::Image
    );
    assert_eq!(
        AdapterError::rate_limited(AdapterFamily::Bgm, "x", None).family(),
        AdapterFamily::Bgm
    );
}

/// Test error display includes the family and classification
#[test]
fn test_display_withAdapterError_shouldNameFamilyAndClass() {
    let error = AdapterError::transient(AdapterFamily::Stock, "connection reset");
    let rendered = error.to_string();
    assert!(rendered.contains("stock"), "missing family in {:?}", rendered);
    assert!(rendered.contains("transient"), "missing class in {:?}", rendered);
    assert!(rendered.contains("connection reset"), "missing message in {:?}", rendered);
}

/// Test error wrapping into the application error
#[test]
fn test_appError_fromSpecificErrors_shouldWrapCorrectly() {
    let config: AppError = ConfigError::MissingCredential("audio.api_key".to_string()).into();
    assert!(matches!(config, AppError::Config(_)));

    let parse: AppError =
        ParseError::UnrecognizedLine { line_no: 3, content: "???".to_string() }.into();
    assert!(matches!(parse, AppError::Parse(_)));
    assert!(parse.to_string().contains("line 3"));

    let adapter: AppError = AdapterError::permanent(AdapterFamily::Audio, "denied").into();
    assert!(matches!(adapter, AppError::Adapter(_)));

    let io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(io, AppError::File(_)));
}
