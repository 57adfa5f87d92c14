//! ABOUTME: Pre-workflow input capture - runs N configured sources concurrently
//! ABOUTME: and aggregates transcript/media results deterministically

use async_trait::async_trait;
use graphflow_core::error::{dependency_failed_error, Result};
use std::sync::Arc;

/// What kind of source a single `InputSource` captures. `Text` sources
/// (a clipboard paste, a prior turn's transcript) need no transcription;
/// `Audio`/`Video` sources are captured then run through a transcription
/// backend before their text is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSourceKind {
    Text,
    Audio,
    Video,
}

/// One configured capture source, in declaration order. `label` identifies
/// the source for error reporting; it plays no role in aggregation order.
pub struct InputSource {
    pub label: String,
    pub kind: InputSourceKind,
    pub capture: Arc<dyn InputCapture>,
}

impl InputSource {
    pub fn new(label: impl Into<String>, kind: InputSourceKind, capture: Arc<dyn InputCapture>) -> Self {
        Self {
            label: label.into(),
            kind,
            capture,
        }
    }
}

/// One source's captured payload before transcription: text already in
/// hand, or a path to a recorded media file a `Transcriber` still needs to
/// process. Hardware capture itself is an external collaborator (see the
/// crate-level Non-goals) - `InputCapture` just has to hand back what it
/// already captured.
#[derive(Debug, Clone, Default)]
pub struct CapturedInput {
    pub text: Option<String>,
    pub media_file: Option<String>,
}

/// One configured source's capture step. Implementations wrap whatever
/// already-captured text or media the caller supplies (a held clipboard
/// string, an already-recorded file path) - this trait does not touch
/// hardware itself.
#[async_trait]
pub trait InputCapture: Send + Sync {
    async fn capture(&self) -> Result<CapturedInput>;
}

/// Turns a recorded media file into transcript text. `Audio`/`Video`
/// sources are passed through this after capture; `Text` sources skip it
/// entirely.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media_file: &str) -> Result<String>;
}

/// The aggregated result of one pre-workflow capture round: the combined
/// transcript (newline-joined across all sources, in declaration order)
/// and the last non-empty media file path seen, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputResult {
    pub transcript: String,
    pub media_file: Option<String>,
}

/// Captures every configured `InputSource` concurrently - one task per
/// source - then joins on all completions and aggregates in declaration
/// order, independent of which source finishes first. The first source to
/// fail short-circuits aggregation; sibling tasks already in flight are
/// still awaited (so their panics/errors don't leak as lost joins) but
/// their results are discarded.
pub struct InputProcessor {
    sources: Vec<InputSource>,
    transcriber: Option<Arc<dyn Transcriber>>,
}

impl InputProcessor {
    pub fn new(sources: Vec<InputSource>, transcriber: Option<Arc<dyn Transcriber>>) -> Self {
        Self { sources, transcriber }
    }

    pub async fn run(&self) -> Result<InputResult> {
        let mut handles = Vec::with_capacity(self.sources.len());
        for (index, source) in self.sources.iter().enumerate() {
            let capture = source.capture.clone();
            let kind = source.kind;
            let label = source.label.clone();
            let transcriber = self.transcriber.clone();
            handles.push(tokio::spawn(async move {
                let result = capture_one(capture, kind, transcriber).await;
                (index, label, result)
            }));
        }

        let mut per_source: Vec<Option<CapturedInput>> = vec![None; handles.len()];
        let mut first_error = None;
        for handle in handles {
            let (index, label, result) = handle
                .await
                .map_err(|e| dependency_failed_error(format!("input capture task panicked: {e}")))?;
            match result {
                Ok(captured) => per_source[index] = Some(captured),
                Err(e) if first_error.is_none() => {
                    first_error = Some(e.with_detail("source", label));
                }
                Err(_) => {}
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let mut lines = Vec::new();
        let mut media_file = None;
        for captured in per_source.into_iter().flatten() {
            if let Some(text) = captured.text {
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            if let Some(path) = captured.media_file {
                if !path.is_empty() {
                    media_file = Some(path);
                }
            }
        }

        Ok(InputResult {
            transcript: lines.join("\n"),
            media_file,
        })
    }
}

async fn capture_one(
    capture: Arc<dyn InputCapture>,
    kind: InputSourceKind,
    transcriber: Option<Arc<dyn Transcriber>>,
) -> Result<CapturedInput> {
    let mut captured = capture.capture().await?;
    if matches!(kind, InputSourceKind::Audio | InputSourceKind::Video) {
        if let Some(path) = captured.media_file.clone() {
            let transcriber = transcriber
                .ok_or_else(|| dependency_failed_error("no transcriber configured for audio/video source"))?;
            let text = transcriber.transcribe(&path).await?;
            captured.text = Some(text);
        }
    }
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphflow_core::error::resource_error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct TextCapture(&'static str);
    #[async_trait]
    impl InputCapture for TextCapture {
        async fn capture(&self) -> Result<CapturedInput> {
            Ok(CapturedInput { text: Some(self.0.to_string()), media_file: None })
        }
    }

    struct SlowTextCapture(&'static str, u64);
    #[async_trait]
    impl InputCapture for SlowTextCapture {
        async fn capture(&self) -> Result<CapturedInput> {
            tokio::time::sleep(Duration::from_millis(self.1)).await;
            Ok(CapturedInput { text: Some(self.0.to_string()), media_file: None })
        }
    }

    struct MediaCapture(&'static str);
    #[async_trait]
    impl InputCapture for MediaCapture {
        async fn capture(&self) -> Result<CapturedInput> {
            Ok(CapturedInput { text: None, media_file: Some(self.0.to_string()) })
        }
    }

    struct FailingCapture;
    #[async_trait]
    impl InputCapture for FailingCapture {
        async fn capture(&self) -> Result<CapturedInput> {
            Err(resource_error("capture device unavailable"))
        }
    }

    struct UppercaseTranscriber(Arc<AtomicUsize>);
    #[async_trait]
    impl Transcriber for UppercaseTranscriber {
        async fn transcribe(&self, media_file: &str) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("transcript of {media_file}"))
        }
    }

    #[tokio::test]
    async fn aggregates_in_declaration_order_regardless_of_finish_order() {
        let sources = vec![
            InputSource::new("first", InputSourceKind::Text, Arc::new(SlowTextCapture("one", 30))),
            InputSource::new("second", InputSourceKind::Text, Arc::new(TextCapture("two"))),
        ];
        let processor = InputProcessor::new(sources, None);
        let result = processor.run().await.unwrap();
        assert_eq!(result.transcript, "one\ntwo");
    }

    #[tokio::test]
    async fn audio_source_is_transcribed_and_media_file_recorded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transcriber = Arc::new(UppercaseTranscriber(calls.clone()));
        let sources = vec![InputSource::new(
            "mic",
            InputSourceKind::Audio,
            Arc::new(MediaCapture("/tmp/clip.wav")),
        )];
        let processor = InputProcessor::new(sources, Some(transcriber));
        let result = processor.run().await.unwrap();
        assert_eq!(result.transcript, "transcript of /tmp/clip.wav");
        assert_eq!(result.media_file.as_deref(), Some("/tmp/clip.wav"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_non_empty_media_file_wins() {
        let sources = vec![
            InputSource::new("a", InputSourceKind::Text, Arc::new(MediaCapture("/tmp/a.wav"))),
            InputSource::new("b", InputSourceKind::Text, Arc::new(MediaCapture("/tmp/b.wav"))),
        ];
        let processor = InputProcessor::new(sources, None);
        let result = processor.run().await.unwrap();
        assert_eq!(result.media_file.as_deref(), Some("/tmp/b.wav"));
    }

    #[tokio::test]
    async fn first_error_short_circuits_aggregation() {
        let sources = vec![
            InputSource::new("ok", InputSourceKind::Text, Arc::new(TextCapture("fine"))),
            InputSource::new("broken", InputSourceKind::Text, Arc::new(FailingCapture)),
        ];
        let processor = InputProcessor::new(sources, None);
        let err = processor.run().await.unwrap_err();
        assert_eq!(err.details.get("source").and_then(|v| v.as_str()), Some("broken"));
    }

    #[tokio::test]
    async fn audio_source_without_transcriber_errors() {
        let sources = vec![InputSource::new(
            "mic",
            InputSourceKind::Audio,
            Arc::new(MediaCapture("/tmp/clip.wav")),
        )];
        let processor = InputProcessor::new(sources, None);
        assert!(processor.run().await.is_err());
    }
}
