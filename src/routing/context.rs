//! Dispatch orchestration.
//!
//! # Responsibilities
//! - Own the resolved pool and the engines every call goes through
//! - Turn a specification into one `CompositeAccessor` per call
//! - Shard and migrate selected accessors before they are handed out
//! - One-time initialization and whole-pool disposal
//!
//! # Design Decisions
//! - Nothing is cached between calls; every call re-evaluates shards and load
//! - Selection errors are fatal to the call and carry criteria and pool size
//! - Options are swapped atomically; descriptors stay as resolved

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{watch, OnceCell};
use tokio_util::sync::CancellationToken;

use crate::accessor::{AccessMode, Accessor, DataAccess};
use crate::config::{validate_config, RouterConfig, RouterOptions};
use crate::dispatch::{
    CompositeAccessor, DefaultStrategy, DispatchMember, DispatchStrategy, MirroringStrategy,
    Redundancy, StripingStrategy,
};
use crate::error::{AccessError, AccessResult, RouterError, RouterResult};
use crate::load::{DeviceLoadSampler, LoadMonitor, SystemLoadSampler};
use crate::migration::{AccessorMigrator, Migrator};
use crate::observability::metrics;
use crate::resolver::{AccessorPool, AccessorRegistry, AccessorResolver, PooledAccessor};
use crate::routing::{AccessorSpecification, ModePredicates};
use crate::sharding::{ShardValueSource, ShardingEngine, SystemShardValues};

/// Entry point for dispatching operations across the accessor pool.
pub struct AccessorContext {
    pool: Arc<AccessorPool>,
    options: ArcSwap<RouterOptions>,
    sharding: ShardingEngine,
    migrator: Arc<dyn Migrator>,
    load: Arc<LoadMonitor>,
    initialized: OnceCell<()>,
}

/// Collects the context's collaborators. Unset ones fall back to system defaults.
pub struct AccessorContextBuilder {
    registry: AccessorRegistry,
    config: RouterConfig,
    sampler: Option<Arc<dyn DeviceLoadSampler>>,
    migrator: Option<Arc<dyn Migrator>>,
    shard_values: Option<Arc<dyn ShardValueSource>>,
}

impl AccessorContextBuilder {
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sampler(mut self, sampler: Arc<dyn DeviceLoadSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn migrator(mut self, migrator: Arc<dyn Migrator>) -> Self {
        self.migrator = Some(migrator);
        self
    }

    pub fn shard_values(mut self, values: Arc<dyn ShardValueSource>) -> Self {
        self.shard_values = Some(values);
        self
    }

    /// Validate the configuration and resolve the pool.
    pub fn build(self) -> RouterResult<AccessorContext> {
        validate_config(&self.config).map_err(|errors| {
            RouterError::Configuration(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        let pool = AccessorResolver.resolve(self.registry, &self.config)?;

        let sampler = self
            .sampler
            .unwrap_or_else(|| Arc::new(SystemLoadSampler::new(&self.config.load_sampling)));
        let values = self
            .shard_values
            .unwrap_or_else(|| Arc::new(SystemShardValues::new()));
        let migrator = self.migrator.unwrap_or_else(|| Arc::new(AccessorMigrator));

        tracing::info!(
            accessors = pool.len(),
            auto_sharding = self.config.options.auto_sharding,
            auto_migration = self.config.options.auto_migration,
            auto_load = self.config.options.auto_load,
            "Accessor context ready"
        );

        Ok(AccessorContext {
            pool: Arc::new(pool),
            options: ArcSwap::from_pointee(self.config.options),
            sharding: ShardingEngine::new(values),
            migrator,
            load: Arc::new(LoadMonitor::new(sampler, self.config.load_sampling.interval())),
            initialized: OnceCell::new(),
        })
    }
}

impl AccessorContext {
    pub fn builder(registry: AccessorRegistry) -> AccessorContextBuilder {
        AccessorContextBuilder {
            registry,
            config: RouterConfig::default(),
            sampler: None,
            migrator: None,
            shard_values: None,
        }
    }

    pub fn pool(&self) -> &AccessorPool {
        &self.pool
    }

    /// Current runtime options.
    pub fn options(&self) -> Arc<RouterOptions> {
        self.options.load_full()
    }

    /// Swap the runtime options. Overrides already baked into descriptors are kept.
    pub fn apply_config(&self, config: &RouterConfig) -> RouterResult<()> {
        validate_config(config).map_err(|errors| {
            RouterError::Configuration(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;
        self.options.store(Arc::new(config.options.clone()));
        tracing::info!(options = ?config.options, "Router options updated");
        Ok(())
    }

    /// Apply every config published on `updates` until it closes or `cancel` fires.
    ///
    /// Invalid configs are logged and skipped.
    pub async fn follow_config(
        &self,
        mut updates: watch::Receiver<RouterConfig>,
        cancel: &CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let config = updates.borrow_and_update().clone();
                    if let Err(e) = self.apply_config(&config) {
                        tracing::error!(error = %e, "Rejected config update");
                    }
                }
            }
        }
        tracing::debug!("Stopped following config updates");
    }

    /// Ensure every store exists and is migrated. Runs at most once per context.
    pub async fn initialize(&self, cancel: &CancellationToken) -> RouterResult<()> {
        self.initialized
            .get_or_try_init(|| async {
                let options = self.options.load_full();
                for pooled in self.pool.iter() {
                    let accessor = pooled.accessor();
                    let sharding = pooled.descriptor().sharding.as_ref();
                    if options.auto_sharding && sharding.is_some() {
                        self.sharding
                            .shard_database(accessor.as_ref(), sharding, cancel)
                            .await?;
                    } else {
                        let created = accessor.try_create_database(cancel).await?;
                        tracing::debug!(accessor = %accessor.id(), created, "Store ensured");
                    }
                    if options.auto_migration {
                        self.migrate(accessor, cancel).await?;
                    }
                }
                tracing::info!(accessors = self.pool.len(), "Accessor context initialized");
                Ok::<(), RouterError>(())
            })
            .await?;
        Ok(())
    }

    /// Accessors for reading. Defaults to every readable accessor.
    pub async fn get_read_accessors(
        &self,
        spec: Option<AccessorSpecification>,
        cancel: &CancellationToken,
    ) -> RouterResult<CompositeAccessor> {
        let spec = spec.unwrap_or_else(AccessorSpecification::read);
        self.get_accessors(&spec, cancel).await
    }

    /// Accessors for writing. Defaults to every writable accessor.
    pub async fn get_write_accessors(
        &self,
        spec: Option<AccessorSpecification>,
        cancel: &CancellationToken,
    ) -> RouterResult<CompositeAccessor> {
        let spec = spec.unwrap_or_else(AccessorSpecification::write);
        self.get_accessors(&spec, cancel).await
    }

    /// Build the composite `spec` selects.
    pub async fn get_accessors(
        &self,
        spec: &AccessorSpecification,
        cancel: &CancellationToken,
    ) -> RouterResult<CompositeAccessor> {
        let options = self.options.load_full();
        match spec {
            AccessorSpecification::Named(_) => self.get_named(spec, &options, cancel).await,
            AccessorSpecification::ByPredicate {
                access, modes, ..
            } => {
                self.get_selected(spec, *access, modes.as_ref(), &options, cancel)
                    .await
            }
        }
    }

    /// Dispose every pooled accessor, collecting failures.
    pub async fn dispose(&self) -> AccessResult<()> {
        let mut errors = Vec::new();
        for pooled in self.pool.iter() {
            if let Err(e) = pooled.accessor().dispose().await {
                tracing::warn!(accessor = %pooled.id(), error = %e, "Dispose failed");
                errors.push(e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AccessError::Dispose(errors))
        }
    }

    async fn get_named(
        &self,
        spec: &AccessorSpecification,
        options: &RouterOptions,
        cancel: &CancellationToken,
    ) -> RouterResult<CompositeAccessor> {
        let matched: Vec<&PooledAccessor> = self
            .pool
            .iter()
            .filter(|p| spec.is_satisfied_by(p.descriptor()))
            .collect();

        let [pooled] = matched.as_slice() else {
            tracing::error!(
                criteria = %spec.criteria(),
                matched = matched.len(),
                pool_size = self.pool.len(),
                "Named specification did not match exactly one accessor"
            );
            metrics::record_selection_error("ambiguous_or_missing");
            return Err(RouterError::AmbiguousOrMissingAccessor {
                criteria: spec.criteria(),
                matched: matched.len(),
                pool_size: self.pool.len(),
            });
        };

        let member = self.prepare(pooled, options, cancel).await?;
        let access = member.descriptor.access;
        tracing::debug!(accessor = %member.id(), "Named accessor selected");
        Ok(
            CompositeAccessor::single(member.accessor as Arc<dyn DataAccess>, access)
                .with_timeout(options.operation_timeout()),
        )
    }

    async fn get_selected(
        &self,
        spec: &AccessorSpecification,
        access: AccessMode,
        modes: Option<&ModePredicates>,
        options: &RouterOptions,
        cancel: &CancellationToken,
    ) -> RouterResult<CompositeAccessor> {
        let selected: Vec<&PooledAccessor> = self
            .pool
            .iter()
            .filter(|p| spec.is_satisfied_by(p.descriptor()))
            .collect();
        if selected.is_empty() {
            return Err(self.no_match(spec));
        }

        // Identities are unique once the pool is resolved
        let mut members = Vec::with_capacity(selected.len());
        for pooled in selected {
            members.push(self.prepare(pooled, options, cancel).await?);
        }

        let timeout = options.operation_timeout();
        let Some(modes) = modes else {
            return Ok(DefaultStrategy.compose(members, access, timeout).await);
        };

        let mut mirrors = Vec::new();
        let mut stripes = Vec::new();
        for member in members {
            if (modes.mirroring)(&member.descriptor) {
                mirrors.push(member);
            } else if (modes.striping)(&member.descriptor) {
                stripes.push(member);
            } else {
                tracing::debug!(accessor = %member.id(), "Accessor matches no dispatching mode, skipped");
            }
        }

        let mirroring = self.mirroring_strategy(options);
        let composite = match (mirrors.is_empty(), stripes.is_empty()) {
            (false, true) => mirroring.compose(mirrors, access, timeout).await,
            (true, false) => StripingStrategy.compose(stripes, access, timeout).await,
            (false, false) => {
                let mirrored = mirroring.compose(mirrors, access, timeout).await;
                let striped = StripingStrategy.compose(stripes, access, timeout).await;
                CompositeAccessor::new(
                    vec![Arc::new(mirrored), Arc::new(striped)],
                    access,
                    Redundancy::Composite,
                )
            }
            (true, true) => return Err(self.no_match(spec)),
        };

        tracing::debug!(
            criteria = %spec.criteria(),
            composite = %composite.id(),
            "Accessors selected"
        );
        Ok(composite)
    }

    /// Shard one selected accessor and migrate it when it landed on a new store.
    async fn prepare(
        &self,
        pooled: &PooledAccessor,
        options: &RouterOptions,
        cancel: &CancellationToken,
    ) -> RouterResult<DispatchMember> {
        let descriptor = pooled.descriptor().clone();
        let mut member = DispatchMember::new(pooled.accessor().clone(), descriptor);
        if !options.auto_sharding {
            return Ok(member);
        }

        let outcome = self
            .sharding
            .shard_database(
                pooled.accessor().as_ref(),
                member.descriptor.sharding.as_ref(),
                cancel,
            )
            .await?;
        if outcome.new_store && options.auto_migration {
            self.migrate(pooled.accessor(), cancel).await?;
        }
        member.shard = outcome.target;
        Ok(member)
    }

    async fn migrate(&self, accessor: &Arc<dyn Accessor>, cancel: &CancellationToken) -> RouterResult<()> {
        self.migrator
            .migrate(accessor.as_ref(), cancel)
            .await
            .map_err(|source| RouterError::Migration {
                accessor: accessor.id().to_string(),
                source,
            })
    }

    fn mirroring_strategy(&self, options: &RouterOptions) -> MirroringStrategy {
        let strategy =
            MirroringStrategy::new(options.smaller_priority_first, options.smaller_load_is_better);
        if options.auto_load {
            strategy.with_load(self.load.clone())
        } else {
            strategy
        }
    }

    fn no_match(&self, spec: &AccessorSpecification) -> RouterError {
        tracing::error!(
            criteria = %spec.criteria(),
            pool_size = self.pool.len(),
            "Specification matched no accessor"
        );
        metrics::record_selection_error("no_match");
        RouterError::NoMatchingAccessor {
            criteria: spec.criteria(),
            pool_size: self.pool.len(),
        }
    }
}

impl std::fmt::Debug for AccessorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorContext")
            .field("pool", &self.pool)
            .field("options", &self.options.load_full())
            .field("initialized", &self.initialized.initialized())
            .finish()
    }
}
