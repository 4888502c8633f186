//! Recording fakes for the collaborators, shared by unit tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread::{self, ThreadId},
};

use bytes::Bytes;
use dashmap::DashSet;

use crate::{
    cache::{DecodedImage, MemoryImageCache},
    core::{
        CachedImage, CancelCause, DiskCache, DisplaySurface, ExecutionCallbacks, ExecutionHandle,
        FailCause, ImageError, ImageFrom, ImageResult, MemoryCache, RequestBinding,
        RequestExecutor, RequestListener, SurfaceImage, TargetId,
    },
    options::{CacheKey, OptionOverrides, RequestDescriptor, ResolvedOptions, ScaleType, Size},
};

pub(crate) fn decoded(mime_type: &str) -> Arc<DecodedImage> {
    Arc::new(DecodedImage::new(
        Bytes::from_static(b"\x00\x01\x02\x03"),
        Size::new(1, 1),
        mime_type,
    ))
}

type OwnerTask = Box<dyn FnOnce() + Send>;

/// Display surface that records everything drawn on it.
///
/// With an owner queue, `run_on_owner` tasks wait until the test drains
/// them, standing in for the surface's own thread.
pub(crate) struct FakeSurface {
    id: TargetId,
    fixed_size: Option<Size>,
    scale_type: ScaleType,
    options: Mutex<Option<OptionOverrides>>,
    listener: Option<Arc<dyn RequestListener>>,
    images: Mutex<Vec<SurfaceImage>>,
    bound: Mutex<Option<RequestBinding>>,
    animation_clears: AtomicUsize,
    draw_threads: Mutex<Vec<ThreadId>>,
    owner_queue: Option<Mutex<Vec<OwnerTask>>>,
}

impl FakeSurface {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id: TargetId(id),
            fixed_size: None,
            scale_type: ScaleType::FitCenter,
            options: Mutex::new(None),
            listener: None,
            images: Mutex::new(Vec::new()),
            bound: Mutex::new(None),
            animation_clears: AtomicUsize::new(0),
            draw_threads: Mutex::new(Vec::new()),
            owner_queue: None,
        }
    }

    pub(crate) fn with_fixed_size(mut self, size: Size) -> Self {
        self.fixed_size = Some(size);
        self
    }

    pub(crate) fn with_scale_type(mut self, scale_type: ScaleType) -> Self {
        self.scale_type = scale_type;
        self
    }

    pub(crate) fn with_options(self, options: OptionOverrides) -> Self {
        *self.options.lock().unwrap() = Some(options);
        self
    }

    pub(crate) fn with_listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub(crate) fn with_owner_queue(mut self) -> Self {
        self.owner_queue = Some(Mutex::new(Vec::new()));
        self
    }

    pub(crate) fn pending_owner_tasks(&self) -> usize {
        self.owner_queue
            .as_ref()
            .map_or(0, |queue| queue.lock().unwrap().len())
    }

    /// Run queued owner tasks on the calling thread.
    pub(crate) fn drain_owner_tasks(&self) -> usize {
        let Some(queue) = &self.owner_queue else {
            return 0;
        };
        let tasks: Vec<OwnerTask> = queue.lock().unwrap().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Thread of every `set_image` call, in order.
    pub(crate) fn draw_threads(&self) -> Vec<ThreadId> {
        self.draw_threads.lock().unwrap().clone()
    }

    pub(crate) fn images(&self) -> Vec<SurfaceImage> {
        self.images.lock().unwrap().clone()
    }

    pub(crate) fn last_image(&self) -> Option<SurfaceImage> {
        self.images.lock().unwrap().last().cloned()
    }

    pub(crate) fn animation_clears(&self) -> usize {
        self.animation_clears.load(Ordering::SeqCst)
    }
}

impl DisplaySurface for FakeSurface {
    fn id(&self) -> TargetId {
        self.id
    }

    fn options(&self) -> Option<OptionOverrides> {
        self.options.lock().unwrap().clone()
    }

    fn set_options(&self, options: OptionOverrides) {
        *self.options.lock().unwrap() = Some(options);
    }

    fn fixed_size(&self) -> Option<Size> {
        self.fixed_size
    }

    fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    fn set_image(&self, image: SurfaceImage) {
        self.draw_threads.lock().unwrap().push(thread::current().id());
        self.images.lock().unwrap().push(image);
    }

    fn clear_animation(&self) {
        self.animation_clears.fetch_add(1, Ordering::SeqCst);
    }

    fn bound_request(&self) -> Option<RequestBinding> {
        *self.bound.lock().unwrap()
    }

    fn set_bound_request(&self, binding: Option<RequestBinding>) {
        *self.bound.lock().unwrap() = binding;
    }

    fn listener(&self) -> Option<Arc<dyn RequestListener>> {
        self.listener.clone()
    }

    fn run_on_owner(&self, task: Box<dyn FnOnce() + Send>) {
        match &self.owner_queue {
            Some(queue) => queue.lock().unwrap().push(task),
            None => task(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ListenerEvent {
    Started,
    Progress(u64, u64),
    Completed(ImageFrom, Option<String>),
    Failed(FailCause),
    Canceled(CancelCause),
}

impl ListenerEvent {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            ListenerEvent::Completed(..) | ListenerEvent::Failed(_) | ListenerEvent::Canceled(_)
        )
    }
}

#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn terminal_events(&self) -> Vec<ListenerEvent> {
        self.events()
            .into_iter()
            .filter(ListenerEvent::is_terminal)
            .collect()
    }

    fn push(&self, event: ListenerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RequestListener for RecordingListener {
    fn on_started(&self) {
        self.push(ListenerEvent::Started);
    }

    fn on_progress(&self, done: u64, total: u64) {
        self.push(ListenerEvent::Progress(done, total));
    }

    fn on_completed(&self, from: ImageFrom, mime_type: Option<&str>) {
        self.push(ListenerEvent::Completed(from, mime_type.map(str::to_string)));
    }

    fn on_failed(&self, cause: &FailCause) {
        self.push(ListenerEvent::Failed(cause.clone()));
    }

    fn on_canceled(&self, cause: CancelCause) {
        self.push(ListenerEvent::Canceled(cause));
    }
}

/// Memory cache counting every lookup.
#[derive(Default)]
pub(crate) struct CountingMemoryCache {
    inner: MemoryImageCache,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl CountingMemoryCache {
    pub(crate) fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub(crate) fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

impl MemoryCache for CountingMemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<dyn CachedImage>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn put(&self, key: CacheKey, image: Arc<dyn CachedImage>) {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, image)
    }

    fn remove(&self, key: &CacheKey) -> Option<Arc<dyn CachedImage>> {
        self.inner.remove(key)
    }
}

/// Disk cache index counting every existence check.
#[derive(Default)]
pub(crate) struct CountingDiskCache {
    uris: DashSet<String>,
    checks: AtomicUsize,
}

impl CountingDiskCache {
    pub(crate) fn insert(&self, uri: &str) {
        self.uris.insert(uri.to_string());
    }

    pub(crate) fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl DiskCache for CountingDiskCache {
    fn has(&self, uri: &str) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.uris.contains(uri)
    }
}

#[derive(Default)]
pub(crate) struct JobState {
    pub(crate) submitted: AtomicBool,
    pub(crate) canceled: AtomicBool,
    pub(crate) finished: AtomicBool,
}

/// A job created by [`ManualExecutor`], driven by hand from tests.
#[derive(Clone)]
pub(crate) struct ManualJob {
    pub(crate) descriptor: RequestDescriptor,
    pub(crate) callbacks: Arc<dyn ExecutionCallbacks>,
    pub(crate) state: Arc<JobState>,
}

impl ManualJob {
    pub(crate) fn is_submitted(&self) -> bool {
        self.state.submitted.load(Ordering::SeqCst)
    }

    pub(crate) fn is_canceled(&self) -> bool {
        self.state.canceled.load(Ordering::SeqCst)
    }

    pub(crate) fn complete(&self, image: Arc<dyn CachedImage>) {
        self.state.finished.store(true, Ordering::SeqCst);
        self.callbacks.on_running();
        self.callbacks.on_completed(image, ImageFrom::Network);
    }

    pub(crate) fn fail(&self, cause: FailCause) {
        self.state.finished.store(true, Ordering::SeqCst);
        self.callbacks.on_running();
        self.callbacks.on_failed(cause);
    }
}

struct ManualHandle {
    state: Arc<JobState>,
    refuse_submit: bool,
}

impl ExecutionHandle for ManualHandle {
    fn submit(&self) -> ImageResult<()> {
        if self.refuse_submit {
            return Err(ImageError::Execution("queue is full".to_string()));
        }
        self.state.submitted.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cancel(&self) {
        self.state.canceled.store(true, Ordering::SeqCst);
        self.state.finished.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }
}

/// Executor recording every job without running it.
#[derive(Default)]
pub(crate) struct ManualExecutor {
    jobs: Mutex<Vec<ManualJob>>,
    refuse_submit: AtomicBool,
}

impl ManualExecutor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn refuse_submit(&self) {
        self.refuse_submit.store(true, Ordering::SeqCst);
    }

    pub(crate) fn jobs(&self) -> Vec<ManualJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub(crate) fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub(crate) fn job(&self, index: usize) -> ManualJob {
        self.jobs.lock().unwrap()[index].clone()
    }
}

impl RequestExecutor for ManualExecutor {
    fn new_request(
        &self,
        descriptor: &RequestDescriptor,
        _options: &Arc<ResolvedOptions>,
        callbacks: Arc<dyn ExecutionCallbacks>,
    ) -> ImageResult<Box<dyn ExecutionHandle>> {
        let state = Arc::new(JobState::default());
        self.jobs.lock().unwrap().push(ManualJob {
            descriptor: descriptor.clone(),
            callbacks,
            state: state.clone(),
        });
        Ok(Box::new(ManualHandle {
            state,
            refuse_submit: self.refuse_submit.load(Ordering::SeqCst),
        }))
    }
}
