//! Collaborator container
//!
//! Holds the downstream collaborators an engine admits requests against, so
//! nothing in the pipeline reaches for global singletons.

use std::sync::Arc;

use super::traits::{DiskCache, MemoryCache, RequestExecutor, SizeCalculator};
use crate::{
    cache::{DiskCacheIndex, MemoryImageCache},
    options::FixedSizeCalculator,
};

/// Downstream collaborators of the admission pipeline
#[derive(Clone)]
pub struct Collaborators {
    memory_cache: Arc<dyn MemoryCache>,
    disk_cache: Arc<dyn DiskCache>,
    size_calculator: Arc<dyn SizeCalculator>,
    executor: Arc<dyn RequestExecutor>,
}

impl Collaborators {
    /// Create a container around `executor` with in-process caches and the
    /// default size calculator
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            memory_cache: Arc::new(MemoryImageCache::new()),
            disk_cache: Arc::new(DiskCacheIndex::new()),
            size_calculator: Arc::new(FixedSizeCalculator),
            executor,
        }
    }

    /// Create a container with custom components
    pub fn with_components(
        memory_cache: Arc<dyn MemoryCache>,
        disk_cache: Arc<dyn DiskCache>,
        size_calculator: Arc<dyn SizeCalculator>,
        executor: Arc<dyn RequestExecutor>,
    ) -> Self {
        Self {
            memory_cache,
            disk_cache,
            size_calculator,
            executor,
        }
    }

    pub fn memory_cache(&self) -> &Arc<dyn MemoryCache> {
        &self.memory_cache
    }

    pub fn disk_cache(&self) -> &Arc<dyn DiskCache> {
        &self.disk_cache
    }

    pub fn size_calculator(&self) -> &Arc<dyn SizeCalculator> {
        &self.size_calculator
    }

    pub fn executor(&self) -> &Arc<dyn RequestExecutor> {
        &self.executor
    }

    pub fn set_memory_cache(&mut self, cache: Arc<dyn MemoryCache>) {
        self.memory_cache = cache;
    }

    pub fn set_disk_cache(&mut self, cache: Arc<dyn DiskCache>) {
        self.disk_cache = cache;
    }

    pub fn set_size_calculator(&mut self, calculator: Arc<dyn SizeCalculator>) {
        self.size_calculator = calculator;
    }
}
