//! Tokio-backed execution collaborator
//!
//! Runs an [`ImageSource`] for every submitted request on a tokio runtime,
//! with a semaphore bounding how many fetches run at once. Cancellation
//! aborts the job future at its next suspension point.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use log::{debug, warn};
use tokio::{runtime::Handle, sync::Semaphore};

use crate::{
    config::ExecutorConfig,
    core::{
        CachedImage, ExecutionCallbacks, ExecutionHandle, FailCause, ImageError, ImageFrom,
        ImageResult, RequestExecutor,
    },
    options::{RequestDescriptor, ResolvedOptions},
};

/// Image fetched and decoded by an [`ImageSource`].
pub struct FetchedImage {
    pub image: Arc<dyn CachedImage>,
    pub from: ImageFrom,
}

/// Fetch and decode pipeline behind the executor.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetch and decode one image. `progress` takes `(done, total)` bytes.
    async fn fetch(
        &self,
        descriptor: &RequestDescriptor,
        options: &ResolvedOptions,
        progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> Result<FetchedImage, FailCause>;
}

/// Executor spawning one tokio task per submitted request.
pub struct TokioExecutor {
    runtime: Handle,
    source: Arc<dyn ImageSource>,
    permits: Arc<Semaphore>,
}

impl TokioExecutor {
    pub fn new(runtime: Handle, source: Arc<dyn ImageSource>, max_concurrency: usize) -> Self {
        Self {
            runtime,
            source,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn from_config(
        config: &ExecutorConfig,
        runtime: Handle,
        source: Arc<dyn ImageSource>,
    ) -> Self {
        Self::new(runtime, source, config.max_concurrency)
    }

    /// Number of fetches that could start right now.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

impl RequestExecutor for TokioExecutor {
    fn new_request(
        &self,
        descriptor: &RequestDescriptor,
        options: &Arc<ResolvedOptions>,
        callbacks: Arc<dyn ExecutionCallbacks>,
    ) -> ImageResult<Box<dyn ExecutionHandle>> {
        let (abort, registration) = AbortHandle::new_pair();
        Ok(Box::new(TokioJob {
            name: descriptor.name.clone(),
            pending: Mutex::new(Some(PendingJob {
                descriptor: descriptor.clone(),
                options: options.clone(),
                callbacks,
                registration,
            })),
            abort,
            finished: Arc::new(AtomicBool::new(false)),
            runtime: self.runtime.clone(),
            source: self.source.clone(),
            permits: self.permits.clone(),
        }))
    }
}

struct PendingJob {
    descriptor: RequestDescriptor,
    options: Arc<ResolvedOptions>,
    callbacks: Arc<dyn ExecutionCallbacks>,
    registration: AbortRegistration,
}

struct TokioJob {
    name: String,
    pending: Mutex<Option<PendingJob>>,
    abort: AbortHandle,
    finished: Arc<AtomicBool>,
    runtime: Handle,
    source: Arc<dyn ImageSource>,
    permits: Arc<Semaphore>,
}

impl TokioJob {
    fn take_pending(&self) -> ImageResult<Option<PendingJob>> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| ImageError::Internal(format!("job state poisoned: {}", self.name)))?;
        Ok(pending.take())
    }
}

impl ExecutionHandle for TokioJob {
    fn submit(&self) -> ImageResult<()> {
        let PendingJob {
            descriptor,
            options,
            callbacks,
            registration,
        } = self
            .take_pending()?
            .ok_or_else(|| ImageError::Execution(format!("job already submitted: {}", self.name)))?;

        let source = self.source.clone();
        let permits = self.permits.clone();
        let finished = self.finished.clone();

        debug!("Submitting job: {}", self.name);
        self.runtime.spawn(async move {
            let work = async {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| FailCause::Execution("executor is closed".to_string()))?;
                callbacks.on_running();
                let progress = |done: u64, total: u64| callbacks.on_progress(done, total);
                source.fetch(&descriptor, &options, &progress).await
            };
            let result = Abortable::new(work, registration).await;
            finished.store(true, Ordering::Release);

            match result {
                Ok(Ok(fetched)) => callbacks.on_completed(fetched.image, fetched.from),
                Ok(Err(cause)) => callbacks.on_failed(cause),
                Err(_aborted) => {
                    debug!("Job aborted: {}", descriptor.name);
                    callbacks.on_canceled();
                }
            }
        });
        Ok(())
    }

    fn cancel(&self) {
        self.abort.abort();
        match self.take_pending() {
            // Never spawned, nothing will report back.
            Ok(Some(_)) => self.finished.store(true, Ordering::Release),
            Ok(None) => {}
            Err(e) => warn!("Failed to cancel job: {e}"),
        }
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        cache::DecodedImage,
        options::{resolve_load, FixedSizeCalculator, OptionOverrides, Policy, Size},
    };

    struct StubSource;

    #[async_trait]
    impl ImageSource for StubSource {
        async fn fetch(
            &self,
            descriptor: &RequestDescriptor,
            _options: &ResolvedOptions,
            progress: &(dyn Fn(u64, u64) + Send + Sync),
        ) -> Result<FetchedImage, FailCause> {
            if descriptor.uri.contains("slow") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if descriptor.uri.contains("broken") {
                return Err(FailCause::Decode("bad header".to_string()));
            }
            progress(4, 4);
            Ok(FetchedImage {
                image: Arc::new(DecodedImage::new(
                    Bytes::from_static(b"\x00\x01\x02\x03"),
                    Size::new(1, 1),
                    "image/png",
                )),
                from: ImageFrom::Network,
            })
        }
    }

    #[derive(Debug, PartialEq)]
    enum Event {
        Running,
        Progress(u64, u64),
        Completed(ImageFrom),
        Failed(FailCause),
        Canceled,
    }

    struct ChannelCallbacks(mpsc::UnboundedSender<Event>);

    impl ExecutionCallbacks for ChannelCallbacks {
        fn on_running(&self) {
            let _ = self.0.send(Event::Running);
        }

        fn on_progress(&self, done: u64, total: u64) {
            let _ = self.0.send(Event::Progress(done, total));
        }

        fn on_completed(&self, _image: Arc<dyn CachedImage>, from: ImageFrom) {
            let _ = self.0.send(Event::Completed(from));
        }

        fn on_failed(&self, cause: FailCause) {
            let _ = self.0.send(Event::Failed(cause));
        }

        fn on_canceled(&self) {
            let _ = self.0.send(Event::Canceled);
        }
    }

    fn job(
        executor: &TokioExecutor,
        uri: &str,
    ) -> (Box<dyn ExecutionHandle>, mpsc::UnboundedReceiver<Event>) {
        let resolution = resolve_load(
            uri,
            &OptionOverrides::default(),
            &Policy::default(),
            &FixedSizeCalculator,
        );
        let descriptor = RequestDescriptor::new(uri, None, resolution.name);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = executor
            .new_request(
                &descriptor,
                &Arc::new(resolution.options),
                Arc::new(ChannelCallbacks(tx)),
            )
            .unwrap();
        (handle, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for callback")
            .expect("callbacks dropped")
    }

    fn executor(max_concurrency: usize) -> TokioExecutor {
        TokioExecutor::new(Handle::current(), Arc::new(StubSource), max_concurrency)
    }

    #[tokio::test]
    async fn test_job_completes() {
        let _ = env_logger::builder().is_test(true).try_init();
        let executor = executor(2);
        let (handle, mut rx) = job(&executor, "http://a/b.png");

        handle.submit().unwrap();
        assert_eq!(next(&mut rx).await, Event::Running);
        assert_eq!(next(&mut rx).await, Event::Progress(4, 4));
        assert_eq!(next(&mut rx).await, Event::Completed(ImageFrom::Network));
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_job_failure_is_reported() {
        let executor = executor(2);
        let (handle, mut rx) = job(&executor, "http://a/broken.png");

        handle.submit().unwrap();
        assert_eq!(next(&mut rx).await, Event::Running);
        assert_eq!(
            next(&mut rx).await,
            Event::Failed(FailCause::Decode("bad header".to_string()))
        );
    }

    #[tokio::test]
    async fn test_double_submit_is_rejected() {
        let executor = executor(1);
        let (handle, _rx) = job(&executor, "http://a/slow.png");

        handle.submit().unwrap();
        assert!(matches!(handle.submit(), Err(ImageError::Execution(_))));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_permit() {
        let executor = executor(1);
        let (slow, mut slow_rx) = job(&executor, "http://a/slow.png");
        let (queued, mut queued_rx) = job(&executor, "http://a/b.png");

        slow.submit().unwrap();
        assert_eq!(next(&mut slow_rx).await, Event::Running);
        assert_eq!(executor.available_permits(), 0);

        queued.submit().unwrap();
        queued.cancel();
        assert_eq!(next(&mut queued_rx).await, Event::Canceled);
        assert!(queued.is_finished());

        slow.cancel();
        assert_eq!(next(&mut slow_rx).await, Event::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_before_submit() {
        let executor = executor(1);
        let (handle, _rx) = job(&executor, "http://a/b.png");

        handle.cancel();
        assert!(handle.is_finished());
        assert!(matches!(handle.submit(), Err(ImageError::Execution(_))));
    }

    #[tokio::test]
    async fn test_cancel_releases_pending_callbacks() {
        let executor = executor(1);
        let (tx, _rx) = mpsc::unbounded_channel();
        let callbacks = Arc::new(ChannelCallbacks(tx));
        let resolution = resolve_load(
            "http://a/b.png",
            &OptionOverrides::default(),
            &Policy::default(),
            &FixedSizeCalculator,
        );
        let descriptor = RequestDescriptor::new("http://a/b.png", None, resolution.name);

        let handle = executor
            .new_request(&descriptor, &Arc::new(resolution.options), callbacks.clone())
            .unwrap();
        assert_eq!(Arc::strong_count(&callbacks), 2);

        handle.cancel();
        assert_eq!(Arc::strong_count(&callbacks), 1);
    }
}
