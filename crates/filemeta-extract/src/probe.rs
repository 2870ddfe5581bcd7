//! Media probe extraction for audio and video containers.
//!
//! The stream is spooled to a temporary file and handed to a
//! [`MediaProber`]. The production prober runs
//! `ffprobe -v error -print_format json -show_format -show_streams`.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use filemeta_core::defaults::{
    ENV_FFPROBE_PATH, ENV_FFPROBE_TIMEOUT_SECS, FFPROBE_PATH, FFPROBE_TIMEOUT_SECS,
};
use filemeta_core::{
    env_secs, AllowList, ByteStream, Error, Metadata, MetadataExtractor, NestedMapping, Result,
};

// =============================================================================
// PROBE REPORT
// =============================================================================

/// Parsed probe output. Keys not modelled here are kept in `extra` so the
/// full report can be attached as metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub format: ProbeFormat,
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(flatten)]
    pub extra: NestedMapping,
}

/// Container-level probe section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeFormat {
    /// Seconds, reported as a decimal string or a number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "NestedMapping::is_empty")]
    pub tags: NestedMapping,
    #[serde(flatten)]
    pub extra: NestedMapping,
}

/// One elementary stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeStream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(flatten)]
    pub extra: NestedMapping,
}

impl ProbeFormat {
    /// Duration in whole milliseconds, rounded to nearest.
    pub fn duration_ms(&self) -> Result<Option<u64>> {
        let secs = match &self.duration {
            None | Some(JsonValue::Null) => return Ok(None),
            Some(JsonValue::Number(n)) => n.as_f64(),
            Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match secs {
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                Ok(Some((secs * 1000.0).round() as u64))
            }
            _ => Err(Error::Probe(format!(
                "Unparseable duration: {}",
                self.duration.as_ref().map(JsonValue::to_string).unwrap_or_default()
            ))),
        }
    }

    /// Format tag value, matching the tag name case-insensitively.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

impl ProbeReport {
    /// First video stream that reports both dimensions.
    pub fn primary_video(&self) -> Option<&ProbeStream> {
        self.streams.iter().find(|stream| {
            stream.codec_type.as_deref() == Some("video")
                && stream.width.is_some()
                && stream.height.is_some()
        })
    }

    pub fn to_mapping(&self) -> Result<NestedMapping> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(map),
            _ => Err(Error::Internal(
                "probe report serialized to non-object".to_string(),
            )),
        }
    }
}

/// Map a probe report to [`Metadata`], attaching the filtered report.
pub fn metadata_from_report(report: &ProbeReport, allow_list: &AllowList) -> Metadata {
    let mut metadata = Metadata::default();

    match report.format.duration_ms() {
        Ok(duration) => metadata.duration = duration,
        Err(e) => warn!(
            subsystem = "extract",
            component = "probe",
            error = %e,
            "Ignoring media duration"
        ),
    }

    metadata.title = report.format.tag("title").map(str::to_string);
    metadata.description = report
        .format
        .tag("comment")
        .or_else(|| report.format.tag("comments"))
        .map(str::to_string);

    if let Some(video) = report.primary_video() {
        metadata.width = video.width;
        metadata.height = video.height;
    }

    match report.to_mapping() {
        Ok(mapping) => {
            let mut filtered = allow_list.filter(&mapping);
            filemeta_core::trim_strings(&mut filtered);
            metadata.metadata = (!filtered.is_empty()).then_some(filtered);
        }
        Err(e) => warn!(
            subsystem = "extract",
            component = "probe",
            error = %e,
            "Failed to serialize probe report"
        ),
    }

    metadata
}

// =============================================================================
// PROBER
// =============================================================================

/// External media probing facility.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probe the media file at `path`.
    async fn probe(&self, path: &Path) -> Result<ProbeReport>;

    /// Check whether the prober can run.
    async fn health_check(&self) -> Result<bool>;

    fn name(&self) -> &str;
}

/// Runs the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: String,
    timeout: Duration,
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new(FFPROBE_PATH, Duration::from_secs(FFPROBE_TIMEOUT_SECS))
    }
}

impl FfprobeProber {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Create from `FFPROBE_PATH` and `FFPROBE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let binary = std::env::var(ENV_FFPROBE_PATH)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| FFPROBE_PATH.to_string());
        let timeout_secs = env_secs(ENV_FFPROBE_TIMEOUT_SECS, FFPROBE_TIMEOUT_SECS)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Using default ffprobe timeout");
                FFPROBE_TIMEOUT_SECS
            });
        Self::new(binary, Duration::from_secs(timeout_secs))
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeReport> {
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::Probe(format!(
                    "ffprobe timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Probe(format!("Failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Probe(format!(
                "ffprobe failed (exit {}): {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Probe(format!("Malformed ffprobe output: {}", e)))
    }

    async fn health_check(&self) -> Result<bool> {
        let ok = match Command::new(&self.binary)
            .arg("-version")
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(_) => false,
        };
        Ok(ok)
    }

    fn name(&self) -> &str {
        "ffprobe"
    }
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// Extracts metadata from audio and video streams through a [`MediaProber`].
#[derive(Clone)]
pub struct ProbeExtractor {
    prober: Arc<dyn MediaProber>,
}

impl ProbeExtractor {
    pub fn new(prober: Arc<dyn MediaProber>) -> Self {
        Self { prober }
    }

    pub fn from_env() -> Self {
        Self::new(Arc::new(FfprobeProber::from_env()))
    }

    async fn probe_stream(&self, mut stream: ByteStream) -> Result<ProbeReport> {
        let spool = NamedTempFile::new()
            .map_err(|e| Error::Internal(format!("Failed to create temp file: {}", e)))?;
        let mut file = tokio::fs::File::from_std(spool.as_file().try_clone()?);
        let written = tokio::io::copy(&mut stream, &mut file).await?;
        file.flush().await?;
        drop(file);

        debug!(
            subsystem = "extract",
            component = "probe",
            prober = self.prober.name(),
            byte_len = written,
            "Probing spooled media"
        );

        // `spool` outlives the probe and removes the file on every exit path.
        self.prober.probe(spool.path()).await
    }
}

#[async_trait]
impl MetadataExtractor for ProbeExtractor {
    async fn extract(&self, stream: ByteStream, allow_list: &AllowList) -> Metadata {
        let start = Instant::now();

        let report = match self.probe_stream(stream).await {
            Ok(report) => report,
            Err(e) => {
                error!(
                    subsystem = "extract",
                    component = "probe",
                    prober = self.prober.name(),
                    error = %e,
                    "Media probe failed"
                );
                return Metadata::default();
            }
        };

        let metadata = metadata_from_report(&report, allow_list);
        info!(
            subsystem = "extract",
            component = "probe",
            streams = report.streams.len(),
            duration = ?metadata.duration,
            duration_ms = start.elapsed().as_millis() as u64,
            "Media metadata extracted"
        );
        metadata
    }

    fn name(&self) -> &str {
        "probe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(value: JsonValue) -> ProbeReport {
        serde_json::from_value(value).unwrap()
    }

    fn sample_report() -> ProbeReport {
        report(json!({
            "streams": [
                { "index": 0, "codec_type": "audio", "codec_name": "aac" },
                { "index": 1, "codec_type": "video", "width": 1920, "height": 1080 },
                { "index": 2, "codec_type": "video", "width": 640, "height": 480 }
            ],
            "format": {
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "12.3456",
                "tags": { "TITLE": " Holiday ", "Comments": "fallback", "encoder": "Lavf" }
            }
        }))
    }

    #[test]
    fn test_first_qualifying_video_stream() {
        let meta = metadata_from_report(&sample_report(), &AllowList::All);
        assert_eq!(meta.width, Some(1920));
        assert_eq!(meta.height, Some(1080));
    }

    #[test]
    fn test_video_without_both_dimensions_is_skipped() {
        let r = report(json!({
            "streams": [
                { "codec_type": "video", "width": 100 },
                { "codec_type": "video", "width": 320, "height": 240 }
            ]
        }));
        let meta = metadata_from_report(&r, &AllowList::All);
        assert_eq!((meta.width, meta.height), (Some(320), Some(240)));
    }

    #[test]
    fn test_audio_only_has_no_dimensions() {
        let r = report(json!({ "streams": [{ "codec_type": "audio" }] }));
        let meta = metadata_from_report(&r, &AllowList::All);
        assert!(meta.width.is_none());
        assert!(meta.height.is_none());
    }

    #[test]
    fn test_duration_rounds_to_millis() {
        let meta = metadata_from_report(&sample_report(), &AllowList::All);
        assert_eq!(meta.duration, Some(12346));

        let numeric = report(json!({ "format": { "duration": 1.0004 } }));
        assert_eq!(numeric.format.duration_ms().unwrap(), Some(1000));
    }

    #[test]
    fn test_bad_duration_is_omitted() {
        let r = report(json!({ "format": { "duration": "N/A" } }));
        assert!(r.format.duration_ms().is_err());
        let meta = metadata_from_report(&r, &AllowList::All);
        assert!(meta.duration.is_none());
    }

    #[test]
    fn test_tags_case_insensitive_with_comment_fallback() {
        let meta = metadata_from_report(&sample_report(), &AllowList::All);
        assert_eq!(meta.title.as_deref(), Some("Holiday"));
        assert_eq!(meta.description.as_deref(), Some("fallback"));

        let r = report(json!({
            "format": { "tags": { "comment": "primary", "comments": "fallback" } }
        }));
        let meta = metadata_from_report(&r, &AllowList::All);
        assert_eq!(meta.description.as_deref(), Some("primary"));
    }

    #[test]
    fn test_report_filtered_and_keeps_unknown_keys() {
        let meta = metadata_from_report(&sample_report(), &AllowList::sections(["format"]));
        let bag = meta.metadata.unwrap();
        assert!(!bag.contains_key("streams"));
        assert_eq!(bag["format"]["format_name"], "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(bag["format"]["tags"]["TITLE"], "Holiday");

        let full = metadata_from_report(&sample_report(), &AllowList::All);
        assert_eq!(full.metadata.unwrap()["streams"][1]["index"], 1);
    }

    #[test]
    fn test_default_allow_list_drops_probe_sections() {
        let meta = metadata_from_report(&sample_report(), &AllowList::default());
        assert!(meta.metadata.is_none());
    }

    struct FailingProber;

    #[async_trait]
    impl MediaProber for FailingProber {
        async fn probe(&self, _path: &Path) -> Result<ProbeReport> {
            Err(Error::Probe("boom".to_string()))
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_probe_failure_yields_empty_metadata() {
        let extractor = ProbeExtractor::new(Arc::new(FailingProber));
        let stream: ByteStream = Box::new(std::io::Cursor::new(b"media".to_vec()));
        let meta = extractor.extract(stream, &AllowList::All).await;
        assert!(meta.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_probe_error() {
        let prober = FfprobeProber::new("/nonexistent/ffprobe-binary", Duration::from_secs(5));
        let err = prober.probe(Path::new("/tmp/none.mp4")).await.unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
        assert!(!prober.health_check().await.unwrap());
    }

    #[test]
    fn test_default_prober() {
        let prober = FfprobeProber::default();
        assert_eq!(prober.binary(), "ffprobe");
        assert_eq!(prober.timeout(), Duration::from_secs(60));
    }
}
