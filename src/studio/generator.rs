use crate::{
    error::{GenerationError, ResolutionError},
    logger,
    models::{is_image_reference, GenerationRequest, ImageRecord},
    studio::{
        image_client::ImageSource,
        progress::{Progress, ProgressTracker},
        resolver,
    },
};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Fans one prompt out into a batch of concurrent requests and collects the
/// resolved images in submission order. A batch either fully succeeds or
/// fails with the first error seen.
#[derive(Clone)]
pub struct Generator {
    source: Arc<dyn ImageSource>,
    progress: ProgressTracker,
}

impl Generator {
    pub fn new(source: Arc<dyn ImageSource>, progress: ProgressTracker) -> Self {
        Self { source, progress }
    }

    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// An empty prompt is a no-op: nothing is requested and the batch is empty.
    pub async fn generate(
        &self,
        prompt: &str,
        count: usize,
    ) -> Result<Vec<ImageRecord>, GenerationError> {
        self.run(GenerationRequest::new(prompt, count), None).await
    }

    /// Like [`Generator::generate`], but gives up with
    /// [`GenerationError::Cancelled`] as soon as `cancel` fires.
    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        count: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<ImageRecord>, GenerationError> {
        self.run(GenerationRequest::new(prompt, count), Some(cancel))
            .await
    }

    async fn run(
        &self,
        request: GenerationRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<ImageRecord>, GenerationError> {
        let Some(prompt) = request.normalized_prompt() else {
            log::debug!("Ignoring empty prompt");
            return Ok(Vec::new());
        };
        let count = request.normalized_count();

        log::info!("Generating {} image(s) for prompt: {}", count, prompt);
        let _timer = logger::timer("image batch");
        let run = self.progress.start();

        let batch = try_join_all((0..count).map(|index| self.generate_one(prompt, index)));
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::warn!("Batch cancelled, discarding {} pending request(s)", count);
                    // Dropping `run` stops the ticker without completing.
                    return Err(GenerationError::Cancelled);
                }
                outcome = batch => outcome,
            },
            None => batch.await,
        };

        run.settle();
        match &outcome {
            Ok(records) => log::info!("Batch of {} image(s) ready", records.len()),
            Err(e) => log::error!("Batch failed: {}", e),
        }
        outcome
    }

    async fn generate_one(
        &self,
        prompt: &str,
        index: usize,
    ) -> Result<ImageRecord, GenerationError> {
        let response = self.source.fetch(prompt).await?.error_for_status()?;
        let reference = resolver::resolve(&response)
            .and_then(|reference| {
                if is_image_reference(&reference) {
                    Ok(reference)
                } else {
                    Err(ResolutionError::NotAnImageReference)
                }
            })
            .map_err(|e| {
                log::warn!("Request {} could not be resolved: {}", index + 1, e);
                e
            })?;
        log::debug!("Request {} resolved", index + 1);
        Ok(ImageRecord::new(reference, prompt))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        error::GenerationErrorKind,
        studio::image_client::RawResponse,
        studio::progress::ProgressPhase,
    };
    use async_trait::async_trait;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    /// Answers the n-th call with `script(n)` after `delay(n)`.
    pub(crate) struct ScriptedSource {
        calls: AtomicUsize,
        prompts: std::sync::Mutex<Vec<String>>,
        script: Box<dyn Fn(usize) -> Result<RawResponse, GenerationError> + Send + Sync>,
        delay: Box<dyn Fn(usize) -> Duration + Send + Sync>,
    }

    impl ScriptedSource {
        pub(crate) fn new(
            script: impl Fn(usize) -> Result<RawResponse, GenerationError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                prompts: std::sync::Mutex::new(Vec::new()),
                script: Box::new(script),
                delay: Box::new(|_| Duration::from_millis(10)),
            }
        }

        pub(crate) fn urls() -> Self {
            Self::new(|n| {
                Ok(RawResponse::new(
                    200,
                    Some("text/plain"),
                    format!("https://img.example/{}.png", n),
                ))
            })
        }

        pub(crate) fn with_delay(mut self, delay: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
            self.delay = Box::new(delay);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageSource for ScriptedSource {
        async fn fetch(&self, prompt: &str) -> Result<RawResponse, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            tokio::time::sleep((self.delay)(n)).await;
            (self.script)(n)
        }
    }

    fn generator(source: Arc<ScriptedSource>) -> Generator {
        Generator::new(source, ProgressTracker::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_prompt_is_noop() {
        let source = Arc::new(ScriptedSource::urls());
        let records = generator(source.clone()).generate("   ", 2).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_clamped() {
        let source = Arc::new(ScriptedSource::urls());
        let gen = generator(source.clone());

        assert_eq!(gen.generate("cat", 9).await.unwrap().len(), 4);
        assert_eq!(source.calls(), 4);

        assert_eq!(gen.generate("cat", 0).await.unwrap().len(), 1);
        assert_eq!(source.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_trimmed_prompt_for_every_request() {
        let source = Arc::new(ScriptedSource::urls());
        let records = generator(source.clone()).generate("  neon city  ", 3).await.unwrap();

        assert_eq!(source.prompts(), vec!["neon city"; 3]);
        assert!(records.iter().all(|r| r.prompt == "neon city"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_submission_order() {
        // Earlier requests finish later.
        let source = Arc::new(
            ScriptedSource::urls().with_delay(|n| Duration::from_millis(400 - 100 * n as u64)),
        );
        let records = generator(source).generate("cat", 4).await.unwrap();

        let refs: Vec<_> = records.iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(
            refs,
            vec![
                "https://img.example/0.png",
                "https://img.example/1.png",
                "https://img.example/2.png",
                "https://img.example/3.png",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_run_concurrently() {
        let source = Arc::new(ScriptedSource::urls().with_delay(|_| Duration::from_secs(1)));
        let started = tokio::time::Instant::now();
        generator(source).generate("cat", 4).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_fails_batch() {
        let source = Arc::new(ScriptedSource::new(|n| {
            if n == 2 {
                Ok(RawResponse::new(500, Some("text/plain"), "boom"))
            } else {
                Ok(RawResponse::new(200, Some("image/png"), vec![1, 2, 3]))
            }
        }));
        let err = generator(source).generate("cat", 4).await.unwrap_err();
        assert_eq!(err, GenerationError::HttpStatus { status: 500 });
        assert_eq!(err.to_string(), "API error (500)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_failure_surfaces() {
        let source = Arc::new(ScriptedSource::new(|_| {
            Ok(RawResponse::new(200, Some("text/html"), "<html>busy</html>"))
        }));
        let err = generator(source).generate("cat", 1).await.unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::Resolution);
        assert_eq!(err, GenerationError::from(ResolutionError::UnexpectedFormat));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_payload_without_reference_rejected() {
        let source = Arc::new(ScriptedSource::new(|_| {
            Ok(RawResponse::new(200, Some("application/json"), r#"{"status": "queued"}"#))
        }));
        let err = generator(source).generate("cat", 2).await.unwrap_err();
        assert_eq!(err, GenerationError::from(ResolutionError::NotAnImageReference));
        assert_eq!(err.kind(), GenerationErrorKind::Resolution);
    }

    #[tokio::test(start_paused = true)]
    async fn test_json_reference_accepted() {
        let source = Arc::new(ScriptedSource::new(|_| {
            Ok(RawResponse::new(
                200,
                Some("application/json"),
                r#"{"status": "done", "output": ["https://img.example/out.png"]}"#,
            ))
        }));
        let records = generator(source).generate("cat", 1).await.unwrap();
        assert_eq!(records[0].reference, "https://img.example/out.png");
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_surfaces() {
        let source = Arc::new(ScriptedSource::new(|_| {
            Err(GenerationError::Network("connection refused".into()))
        }));
        let err = generator(source).generate("cat", 2).await.unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::Network);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_settles_after_batch() {
        let source = Arc::new(ScriptedSource::urls().with_delay(|_| Duration::from_secs(2)));
        let gen = generator(source);
        let progress = gen.progress();

        let handle = tokio::spawn({
            let gen = gen.clone();
            async move { gen.generate("cat", 2).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        let mid = *progress.borrow();
        assert!(matches!(mid.phase, ProgressPhase::InFlight { .. }));
        assert!(mid.percent > 8 && mid.percent < 100);

        handle.await.unwrap().unwrap();
        assert_eq!(progress.borrow().percent, 100);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*progress.borrow(), Progress::IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_settles_after_failure() {
        let source = Arc::new(ScriptedSource::new(|_| Ok(RawResponse::new(404, None, Vec::<u8>::new()))));
        let gen = generator(source);
        let progress = gen.progress();

        assert!(gen.generate("cat", 1).await.is_err());
        assert_eq!(progress.borrow().phase, ProgressPhase::Settling);
        assert_eq!(progress.borrow().percent, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_batch_and_ticker() {
        let source = Arc::new(ScriptedSource::urls().with_delay(|_| Duration::from_secs(30)));
        let gen = generator(source);
        let progress = gen.progress();
        let token = CancellationToken::new();

        let handle = tokio::spawn({
            let gen = gen.clone();
            let token = token.clone();
            async move { gen.generate_with_cancel("cat", 3, token).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err, GenerationError::Cancelled);
        assert_eq!(*progress.borrow(), Progress::IDLE);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*progress.borrow(), Progress::IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_batches_share_progress() {
        // Whichever batch fetches first finishes after 1s, the other after 3s.
        let source = Arc::new(ScriptedSource::urls().with_delay(|n| {
            if n == 0 {
                Duration::from_secs(1)
            } else {
                Duration::from_secs(3)
            }
        }));
        let gen = generator(source);
        let progress = gen.progress();

        let fast = tokio::spawn({
            let gen = gen.clone();
            async move { gen.generate("fox", 1).await }
        });
        let slow = tokio::spawn({
            let gen = gen.clone();
            async move { gen.generate("owl", 1).await }
        });

        fast.await.unwrap().unwrap();
        let mid = *progress.borrow();
        assert!(matches!(mid.phase, ProgressPhase::InFlight { .. }));
        assert!(mid.percent < 100);

        // Past the reset delay: the finished batch must not idle the signal.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(matches!(progress.borrow().phase, ProgressPhase::InFlight { .. }));

        slow.await.unwrap().unwrap();
        assert_eq!(progress.borrow().phase, ProgressPhase::Settling);
        assert_eq!(progress.borrow().percent, 100);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*progress.borrow(), Progress::IDLE);
    }
}
