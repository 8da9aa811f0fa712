//! Dependency initialization and wiring for the search sync engine.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use search_sync_repository::{
    IndexLifecycleManager, IndexNaming, OpenSearchProvider, SearchClusterProvider,
    SearchIndexService,
};
use search_sync_shared::EntityRegistry;

use crate::config::{ConnectionMode, Settings};
use crate::entities::default_registry;
use crate::loader::SearchLoader;
use crate::migration::MigrationCoordinator;
use crate::orchestrator::{OrchestratorConfig, SyncOrchestrator};
use crate::source::{JsonLinesSource, SourceStore};
use crate::IndexingError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub registry: Arc<EntityRegistry>,
    pub lifecycle: Arc<IndexLifecycleManager>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub migrations: MigrationCoordinator,
}

impl Dependencies {
    /// Connect to OpenSearch and wire the engine over the JSON-lines source.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails; connection failures only
    ///   in fail-fast mode
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index_prefix = %settings.index_prefix,
            source_dir = %settings.source_dir.display(),
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let registry = default_registry(&settings.batch_sizes)?;

        let provider = Self::connect_to_opensearch(
            &settings.opensearch_url,
            &settings.index_prefix,
            settings.request_timeout,
            settings.connection_mode,
            settings.retry_interval,
        )
        .await?;

        info!("OpenSearch connection established");

        let source = JsonLinesSource::new(settings.source_dir.clone());

        Self::from_parts(Arc::new(provider), Arc::new(source), registry, settings)
    }

    /// Wire the engine over already-built collaborators.
    pub fn from_parts(
        provider: Arc<dyn SearchClusterProvider>,
        source: Arc<dyn SourceStore>,
        registry: EntityRegistry,
        settings: &Settings,
    ) -> Result<Self, IndexingError> {
        let naming = IndexNaming::new(settings.index_prefix.clone())
            .map_err(|e| IndexingError::config(e.to_string()))?;

        if let Some(max) = settings.service_config.max_batch_size {
            if let Some(descriptor) = registry.iter().find(|d| d.batch_size() > max) {
                return Err(IndexingError::config(format!(
                    "Batch size {} of entity '{}' exceeds the maximum of {}",
                    descriptor.batch_size(),
                    descriptor.name(),
                    max
                )));
            }
        }

        let registry = Arc::new(registry);
        let lifecycle = Arc::new(IndexLifecycleManager::new(
            provider.clone(),
            naming,
            settings.index_config.clone(),
        ));
        let service = SearchIndexService::with_config(provider, settings.service_config.clone());
        let loader = SearchLoader::new(Arc::new(service));

        let orchestrator = Arc::new(SyncOrchestrator::with_config(
            registry.clone(),
            source,
            lifecycle.clone(),
            loader,
            OrchestratorConfig {
                page_size: settings.page_size,
                source_retry: settings.source_retry.clone(),
            },
        ));
        let migrations = MigrationCoordinator::new(orchestrator.clone());

        Ok(Self {
            registry,
            lifecycle,
            orchestrator,
            migrations,
        })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        prefix: &str,
        request_timeout: Duration,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchProvider, IndexingError> {
        loop {
            match Self::try_connect_opensearch(url, prefix, request_timeout).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Build a client and make one cheap request to prove the cluster answers.
    async fn try_connect_opensearch(
        url: &str,
        prefix: &str,
        request_timeout: Duration,
    ) -> Result<OpenSearchProvider, IndexingError> {
        let provider = OpenSearchProvider::new(url, request_timeout)
            .await
            .map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch provider: {}", e))
            })?;

        provider
            .index_exists(prefix)
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch is not reachable: {}", e)))?;

        Ok(provider)
    }
}
