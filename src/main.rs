// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use kube::{
    api::DynamicObject,
    runtime::{
        controller::Action,
        reflector::{self, ObjectRef},
        watcher::{self, Config},
        Controller, WatchStreamExt,
    },
    Api, Client, Resource, ResourceExt,
};
use lms_moodle_operator::{
    config::{Cli, LogFormat, OperatorConfig},
    constants::{OPERATOR_NAME, TOKIO_WORKER_THREADS},
    context::{Context, Stores},
    crd::{LMSMoodle, LMSMoodleTemplate},
    health::{run_health_server, HealthState},
    lms_errors::LmsError,
    metrics::{self, REQUEUE_REASON_DEPENDANT_WAIT, REQUEUE_REASON_STORE_SYNC},
    reconcilers::{reconcile_lmsmoodle, reconcile_lmsmoodletemplate, DependentKind, Progress},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] LmsError);

fn main() -> Result<()> {
    let config = OperatorConfig::from(Cli::parse());

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name(OPERATOR_NAME)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    // Respects RUST_LOG if set, otherwise defaults to INFO level.
    // Output format comes from --log-format / RUST_LOG_FORMAT.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting LMS Moodle operator");
    debug!(config = ?config, "Operator configuration");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let (lms_reader, lms_writer) = reflector::store::<LMSMoodle>();
    let ctx = Arc::new(Context {
        client: client.clone(),
        stores: Stores {
            lms_moodles: lms_reader,
        },
        config: config.clone(),
    });

    let health = Arc::new(HealthState::new());

    info!("Starting all controllers");

    // Controllers should never exit - if one fails, we log it and exit the main process
    tokio::select! {
        result = run_lmsmoodle_reflector(client.clone(), lms_writer) => {
            error!("CRITICAL: LMSMoodle reflector exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("LMSMoodle reflector exited unexpectedly without error")
        }
        result = run_lmsmoodle_controller(ctx.clone(), health.clone()) => {
            error!("CRITICAL: LMSMoodle controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("LMSMoodle controller exited unexpectedly without error")
        }
        result = run_lmsmoodletemplate_controller(ctx.clone(), health.clone()) => {
            error!("CRITICAL: LMSMoodleTemplate controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("LMSMoodleTemplate controller exited unexpectedly without error")
        }
        result = run_health_server(config.metrics_addr, health.clone()) => {
            error!("CRITICAL: health server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("health server exited unexpectedly without error")
        }
        () = shutdown_signal() => {
            health.set_ready(false);
            info!("Shutdown signal received, stopping controllers");
            Ok(())
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}

/// Keep the shared `LMSMoodle` store in sync with the cluster.
async fn run_lmsmoodle_reflector(client: Client, writer: reflector::store::Writer<LMSMoodle>) -> Result<()> {
    info!("Starting LMSMoodle reflector");

    let api = Api::<LMSMoodle>::all(client);
    reflector::reflector(writer, watcher::watcher(api, Config::default()))
        .default_backoff()
        .touched_objects()
        .for_each(|event| {
            if let Err(e) = event {
                warn!("LMSMoodle reflector watch error: {e}");
            }
            futures::future::ready(())
        })
        .await;

    Ok(())
}

/// Wait for the `LMSMoodle` store's initial list, then report ready.
///
/// Both controllers read the store, so neither starts before it is synced.
async fn wait_for_store_sync(ctx: &Context, health: &HealthState) -> Result<()> {
    if !ctx.stores.is_synced() {
        info!("Waiting for LMSMoodle store to sync");
    }
    ctx.stores.lms_moodles.wait_until_ready().await?;
    health.set_ready(true);
    Ok(())
}

/// Run the `LMSMoodle` controller
///
/// Owns the four dependant kinds and re-reconciles every site that references a
/// template when the template changes.
async fn run_lmsmoodle_controller(ctx: Arc<Context>, health: Arc<HealthState>) -> Result<()> {
    wait_for_store_sync(&ctx, &health).await?;
    info!("Starting LMSMoodle controller");

    let client = ctx.client.clone();
    let mut controller = Controller::new(Api::<LMSMoodle>::all(client.clone()), Config::default());
    for kind in DependentKind::ALL {
        let resource = kind.api_resource();
        debug!(kind = %kind, "Watching owned dependant kind");
        controller = controller.owns_with(
            Api::<DynamicObject>::all_with(client.clone(), &resource),
            resource,
            Config::default(),
        );
    }

    let stores = ctx.stores.clone();
    controller
        .watches(
            Api::<LMSMoodleTemplate>::all(client),
            Config::default(),
            move |template| stores.lms_moodle_refs_for_template(&template.name_any()),
        )
        .run(reconcile_lmsmoodle_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `LMSMoodleTemplate` controller
///
/// Also watches sites so template status follows sites being added or removed.
async fn run_lmsmoodletemplate_controller(
    ctx: Arc<Context>,
    health: Arc<HealthState>,
) -> Result<()> {
    wait_for_store_sync(&ctx, &health).await?;
    info!("Starting LMSMoodleTemplate controller");

    let client = ctx.client.clone();
    Controller::new(Api::<LMSMoodleTemplate>::all(client.clone()), Config::default())
        .watches(Api::<LMSMoodle>::all(client), Config::default(), |lms| {
            Some(ObjectRef::<LMSMoodleTemplate>::new(
                &lms.spec.lms_moodle_template_name,
            ))
        })
        .run(reconcile_lmsmoodletemplate_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Requeue action after a successful pass.
fn requeue_action(progress: Progress, config: &OperatorConfig) -> Action {
    match progress {
        Progress::Settled => Action::requeue(config.requeue_ready),
        Progress::Requeue => Action::requeue(config.requeue_not_ready),
    }
}

/// Requeue action after a failed pass.
///
/// Permanent errors requeue at the periodic interval.
fn error_requeue_action(err: &LmsError, config: &OperatorConfig) -> Action {
    if err.is_transient() {
        Action::requeue(config.error_requeue)
    } else {
        Action::requeue(config.requeue_ready)
    }
}

/// Reconcile wrapper for `LMSMoodle`
async fn reconcile_lmsmoodle_wrapper(
    lms: Arc<LMSMoodle>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let name = lms.name_any();
    let kind = LMSMoodle::kind(&());

    match reconcile_lmsmoodle(ctx.clone(), lms).await {
        Ok(progress) => {
            if progress == Progress::Requeue {
                debug!(name = %name, "LMSMoodle not settled, requeueing");
                metrics::record_reconciliation_requeue(&kind, REQUEUE_REASON_DEPENDANT_WAIT);
            }
            metrics::record_reconciliation_success(&kind, start.elapsed());
            Ok(requeue_action(progress, &ctx.config))
        }
        Err(e) => {
            error!(name = %name, "Failed to reconcile LMSMoodle: {e:#}");
            metrics::record_reconciliation_error(&kind, start.elapsed());
            Err(LmsError::from(e).into())
        }
    }
}

/// Reconcile wrapper for `LMSMoodleTemplate`
async fn reconcile_lmsmoodletemplate_wrapper(
    template: Arc<LMSMoodleTemplate>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let name = template.name_any();
    let kind = LMSMoodleTemplate::kind(&());

    match reconcile_lmsmoodletemplate(ctx.clone(), template).await {
        Ok(progress) => {
            if progress == Progress::Requeue {
                metrics::record_reconciliation_requeue(&kind, REQUEUE_REASON_STORE_SYNC);
            } else {
                info!(name = %name, "Successfully reconciled LMSMoodleTemplate");
            }
            metrics::record_reconciliation_success(&kind, start.elapsed());
            Ok(requeue_action(progress, &ctx.config))
        }
        Err(e) => {
            error!(name = %name, "Failed to reconcile LMSMoodleTemplate: {e:#}");
            metrics::record_reconciliation_error(&kind, start.elapsed());
            Err(LmsError::from(e).into())
        }
    }
}

/// Error policy shared by both controllers
fn error_policy<K>(resource: Arc<K>, err: &ReconcileError, ctx: Arc<Context>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let reason = err.0.status_reason();
    debug!(
        kind = %K::kind(&()),
        name = ?resource.meta().name,
        reason = %reason,
        transient = err.0.is_transient(),
        "Requeueing after error"
    );
    metrics::record_error(&K::kind(&()), reason);
    error_requeue_action(&err.0, &ctx.config)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
