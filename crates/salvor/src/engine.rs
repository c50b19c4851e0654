// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared component wiring.
//!
//! Every subcommand assembles the same engine from the loaded
//! configuration: local artifact store, optional offsite replicator,
//! backup creator, restore orchestrator, and drill harness. Construction
//! is cheap; the one side effect is reading the encryption key file when
//! one is configured, which fails here rather than halfway through a
//! backup or restore.

use std::path::Path;
use std::sync::Arc;

use salvor_alert::sink_from_config;
use salvor_backup::BackupCreator;
use salvor_config::SalvorConfig;
use salvor_core::{DatabaseProbe, SalvorError};
use salvor_crypto::KeyMaterial;
use salvor_db::PsqlProbe;
use salvor_drill::DrillHarness;
use salvor_replicate::{build_provider, Replicator};
use salvor_restore::RestoreOrchestrator;
use salvor_store::LocalStore;

pub struct Engine {
    pub store: Arc<LocalStore>,
    pub replicator: Option<Arc<Replicator>>,
    pub creator: Arc<BackupCreator>,
    pub orchestrator: Arc<RestoreOrchestrator>,
    pub harness: Arc<DrillHarness>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    pub fn build(config: Arc<SalvorConfig>) -> Result<Self, SalvorError> {
        let alerts = sink_from_config(&config)?;
        let store = Arc::new(LocalStore::new(
            config.artifacts_dir(),
            config.local_retention(),
            config.offsite_retention(),
            alerts.clone(),
        ));

        let replicator = match config.replication.provider {
            Some(_) => {
                let provider = build_provider(&config)?;
                Some(Arc::new(Replicator::new(
                    config.clone(),
                    store.clone(),
                    provider,
                    alerts.clone(),
                )))
            }
            None => None,
        };

        let probe: Arc<dyn DatabaseProbe> = Arc::new(PsqlProbe::new(
            config.database.restore_command.clone(),
            config.database.create_command.clone(),
            config.database.drop_command.clone(),
            config.operation_timeout(),
        ));

        let creator = Arc::new(BackupCreator::new(
            config.clone(),
            store.clone(),
            load_key(&config)?,
            alerts.clone(),
        ));
        let orchestrator = Arc::new(RestoreOrchestrator::new(
            config.clone(),
            store.clone(),
            replicator.clone(),
            probe,
            load_key(&config)?,
            alerts.clone(),
        ));
        let harness = Arc::new(DrillHarness::new(
            config,
            store.clone(),
            creator.clone(),
            orchestrator.clone(),
            alerts,
        ));

        Ok(Self {
            store,
            replicator,
            creator,
            orchestrator,
            harness,
        })
    }

    /// The offsite replicator, or a configuration error telling the
    /// operator to set `replication.provider` first.
    pub fn replicator(&self) -> Result<&Arc<Replicator>, SalvorError> {
        self.replicator.as_ref().ok_or_else(|| {
            SalvorError::Config(
                "replication.provider is not set; offsite operations are disabled".to_string(),
            )
        })
    }
}

// Key material is zeroed on drop and deliberately not cloneable, so the
// creator and the orchestrator each get their own copy from disk.
fn load_key(config: &SalvorConfig) -> Result<Option<KeyMaterial>, SalvorError> {
    match &config.crypto.key_file {
        Some(file) => Ok(Some(KeyMaterial::load(Path::new(file))?)),
        None => Ok(None),
    }
}
