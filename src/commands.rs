//! CLI command handlers.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use hsc_core::{
    Artifact, ConditionStatus, HttpSource, ObjectKey, Resource, artifact_key_for, reasons,
};
use hsc_reconciler::ReconcileOutcome;
use hsc_store::{ObjectStore, StatusStore};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::Commands;
use crate::config::{ControllerConfig, credentials_from_env};
use crate::controller::Controller;
use crate::server::run_server;

/// Execute a CLI command.
///
/// # Errors
///
/// Returns the first failure of the command.
pub async fn execute_command(config: ControllerConfig, command: Commands) -> Result<()> {
    let credentials = credentials_from_env(|var| std::env::var(var).ok())?;
    let controller = Controller::open(config, credentials)?;

    match command {
        Commands::Apply { file } => {
            for applied in apply(&controller, &file).await? {
                println!("{applied}");
            }
        }
        Commands::Reconcile { key } => {
            let outcome = reconcile(&controller, &key, cancel_on_ctrl_c()).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Run => run(&controller, cancel_on_ctrl_c()).await?,
        Commands::Status { key } => {
            let report = status(&controller, &key).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Delete { key } => {
            delete(&controller, &key).await?;
            println!("{key} marked for deletion");
        }
    }
    Ok(())
}

/// What `apply` did to one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Created,
    Configured,
    Unchanged,
}

/// One applied declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub key: ObjectKey,
    pub action: ApplyAction,
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            ApplyAction::Created => "created",
            ApplyAction::Configured => "configured",
            ApplyAction::Unchanged => "unchanged",
        };
        write!(f, "http/{} {action}", self.key)
    }
}

/// Create or update every declaration in a YAML manifest.
///
/// New sources start with `Ready=Unknown`. Changing the spec of an existing
/// source bumps its generation, which the dispatcher picks up.
///
/// # Errors
///
/// Returns an error when the manifest cannot be read or parsed, or a store
/// write fails.
pub async fn apply(controller: &Controller, file: &Path) -> Result<Vec<Applied>> {
    let manifest = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read manifest '{}'", file.display()))?;
    let declared = HttpSource::from_yaml_documents(&manifest)
        .with_context(|| format!("invalid manifest '{}'", file.display()))?;

    let mut applied = Vec::with_capacity(declared.len());
    for source in declared {
        let key = source.key();
        let action = apply_one(controller, source).await?;
        info!(source = %key, ?action, "Applied source");
        applied.push(Applied { key, action });
    }
    Ok(applied)
}

async fn apply_one(controller: &Controller, declared: HttpSource) -> Result<ApplyAction> {
    let existing: Option<HttpSource> = controller.sources.find(&declared.key()).await?;
    let Some(mut current) = existing else {
        let mut created = controller.sources.create(declared).await?;
        created.set_ready(
            ConditionStatus::Unknown,
            reasons::PROGRESSING,
            "waiting for first reconciliation",
        );
        controller.sources.patch_status(&created).await?;
        return Ok(ApplyAction::Created);
    };

    if current.spec == declared.spec && current.metadata.labels == declared.metadata.labels {
        return Ok(ApplyAction::Unchanged);
    }
    current.spec = declared.spec;
    current.metadata.labels = declared.metadata.labels;
    controller.sources.update(current).await?;
    Ok(ApplyAction::Configured)
}

/// Reconcile one source.
///
/// # Errors
///
/// Returns the reconciliation error.
pub async fn reconcile(
    controller: &Controller,
    key: &ObjectKey,
    cancel: CancellationToken,
) -> Result<ReconcileOutcome> {
    controller
        .reconciler
        .reconcile(&cancel, key)
        .await
        .with_context(|| format!("failed to reconcile {key}"))
}

/// Run the resync loop and the artifact server until `cancel` fires.
///
/// # Errors
///
/// Returns an error when the server cannot bind or the dispatcher gives up.
pub async fn run(controller: &Controller, cancel: CancellationToken) -> Result<()> {
    let dispatcher = controller.dispatcher();
    let server = async {
        let served = run_server(
            controller.config.listen_addr,
            controller.config.artifacts_dir(),
            cancel.clone(),
        )
        .await;
        cancel.cancel();
        served.context("artifact server failed")
    };
    let dispatching = async {
        let dispatched = dispatcher.run(cancel.clone()).await;
        cancel.cancel();
        dispatched.context("dispatcher failed")
    };

    futures::future::try_join(server, dispatching).await?;
    info!("Controller stopped");
    Ok(())
}

/// A source next to its artifact record.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub source: HttpSource,
    pub artifact: Option<Artifact>,
}

/// Look up a source and its artifact record.
///
/// # Errors
///
/// Returns an error when the source does not exist or a store read fails.
pub async fn status(controller: &Controller, key: &ObjectKey) -> Result<StatusReport> {
    let source: HttpSource = controller
        .sources
        .get(key)
        .await
        .with_context(|| format!("source {key} not found"))?;
    let artifact_key = if source.status.artifact_name.is_empty() {
        artifact_key_for(&source)
    } else {
        ObjectKey::new(key.namespace.clone(), source.status.artifact_name.clone())
    };
    let artifact: Option<Artifact> = controller.artifacts.find(&artifact_key).await?;
    Ok(StatusReport { source, artifact })
}

/// Set the deletion timestamp of a source.
///
/// Stored archives and the artifact record are left in place.
///
/// # Errors
///
/// Returns an error when the source does not exist or the write fails.
pub async fn delete(controller: &Controller, key: &ObjectKey) -> Result<()> {
    let mut source: HttpSource = controller
        .sources
        .get(key)
        .await
        .with_context(|| format!("source {key} not found"))?;
    if source.metadata.is_being_deleted() {
        return Ok(());
    }
    source.metadata.deletion_timestamp = Some(Utc::now());
    controller.sources.update(source).await?;
    info!(source = %key, "Source marked for deletion");
    Ok(())
}

/// Token cancelled on the first Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, cancelling");
                token.cancel();
            }
            Err(err) => error!("Failed to listen for shutdown signal: {}", err),
        }
    });
    cancel
}
