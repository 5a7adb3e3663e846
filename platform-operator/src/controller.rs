//! Reconciler. Grounded on `controller/reconciler.rs`
//! end to end: the `ResourceContext`/`ControllerContext` split, the
//! `kube::runtime::Controller::new(...).run(reconcile, error_policy, ctx)`
//! wiring, and `ensure_crd` at startup.

use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{ListParams, Patch, PatchParams, PostParams},
    runtime::{controller::Action, watcher, Controller},
    Api, Client, CustomResourceExt, ResourceExt,
};
use platform_helm::HelmBackend;
use platform_types::constants::{release_name, FIELD_MANAGER, COMPONENT_KEYS};
use platform_types::spec::v1::{Platform, PlatformSpec};
use platform_types::status::{ComponentPhase, Phase, PlatformStatusV1};
use serde_json::json;
use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::admission::{apply_defaults, validate, RecordedStorageSizes};
use crate::config::RequeueIntervals;
use crate::error::Error;
use crate::managers::{ComponentManager, ConvergeOutcome};
use crate::status::{aggregate_phase, set_error_condition, upsert_conditions};

pub struct ControllerContext {
    pub k8s: Client,
    pub helm: Arc<dyn HelmBackend + Send + Sync>,
    pub requeue: RequeueIntervals,
}

fn api(ctx: &ControllerContext, platform: &Platform) -> Api<Platform> {
    Api::namespaced(ctx.k8s.clone(), &platform.namespace().unwrap_or_default())
}

async fn patch_status(
    ctx: &ControllerContext,
    platform: &Platform,
    status: PlatformStatusV1,
) -> Result<Platform, Error> {
    let patch = json!({ "status": status });
    let params = PatchParams::apply(FIELD_MANAGER);
    api(ctx, platform)
        .patch_status(&platform.name_any(), &params, &Patch::Merge(&patch))
        .await
        .map_err(|source| Error::Kube { source })
}

async fn ensure_finalizer(ctx: &ControllerContext, platform: &Platform) -> Result<bool, Error> {
    if platform
        .finalizers()
        .iter()
        .any(|f| f == platform_types::constants::FINALIZER)
    {
        return Ok(false);
    }
    let mut finalizers = platform.finalizers().to_vec();
    finalizers.push(platform_types::constants::FINALIZER.to_string());
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api(ctx, platform)
        .patch(
            &platform.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|source| Error::Kube { source })?;
    Ok(true)
}

async fn remove_finalizer(ctx: &ControllerContext, platform: &Platform) -> Result<(), Error> {
    let finalizers: Vec<String> = platform
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != platform_types::constants::FINALIZER)
        .cloned()
        .collect();
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api(ctx, platform)
        .patch(
            &platform.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|source| Error::Kube { source })?;
    Ok(())
}

fn component_values(spec: &PlatformSpec, component_key: &str) -> Result<serde_yaml::Value, Error> {
    use platform_values::ComponentKind;
    let kind: ComponentKind = component_key.parse()?;
    match component_key {
        "metrics" => Ok(platform_values::build(kind, &spec.metrics.clone().unwrap_or_default())?),
        "dashboards" => Ok(platform_values::build(
            kind,
            &spec.dashboards.clone().unwrap_or_default(),
        )?),
        "logs" => Ok(platform_values::build(kind, &spec.logs.clone().unwrap_or_default())?),
        "traces" => Ok(platform_values::build(kind, &spec.traces.clone().unwrap_or_default())?),
        other => Err(Error::Configuration {
            message: format!("unknown component key '{other}'"),
        }),
    }
}

fn component_version<'a>(spec: &'a PlatformSpec, component_key: &str) -> Option<&'a str> {
    match component_key {
        "metrics" => spec.metrics.as_ref().and_then(|s| s.version.as_deref()),
        "dashboards" => spec.dashboards.as_ref().and_then(|s| s.version.as_deref()),
        "logs" => spec.logs.as_ref().and_then(|s| s.version.as_deref()),
        "traces" => spec.traces.as_ref().and_then(|s| s.version.as_deref()),
        _ => None,
    }
}

fn recorded_storage_sizes(helm: &dyn HelmBackend, platform_name: &str, namespace: &str) -> RecordedStorageSizes {
    let mut recorded = RecordedStorageSizes::default();
    for key in COMPONENT_KEYS {
        let name = release_name(platform_name, key);
        let size = helm
            .get(&name, namespace)
            .ok()
            .flatten()
            .and_then(|release| {
                release
                    .values
                    .get("storage")
                    .and_then(|s| s.get("size"))
                    .and_then(|s| s.as_str())
                    .map(str::to_string)
            });
        match key {
            "metrics" => recorded.metrics = size,
            "dashboards" => recorded.dashboards = size,
            "logs" => recorded.logs = size,
            "traces" => recorded.traces = size,
            _ => {}
        }
    }
    recorded
}

fn outcome_to_component_phase(outcome: &ConvergeOutcome) -> (ComponentPhase, Option<String>) {
    match outcome {
        ConvergeOutcome::Installed => (ComponentPhase::Installing, None),
        ConvergeOutcome::Removed => (ComponentPhase::Removed, None),
        ConvergeOutcome::UpToDate => (ComponentPhase::Ready, None),
        ConvergeOutcome::Upgraded { .. } => (ComponentPhase::Ready, None),
        ConvergeOutcome::InstallFailed(message) => (ComponentPhase::Failed, Some(message.clone())),
        ConvergeOutcome::UpgradeFailed { message, .. } => (ComponentPhase::Failed, Some(message.clone())),
        ConvergeOutcome::RemoveFailed(message) => (ComponentPhase::Failed, Some(message.clone())),
    }
}

async fn handle_deletion(ctx: Arc<ControllerContext>, platform: Arc<Platform>) -> Result<Action, Error> {
    let name = platform.name_any();
    if !platform
        .finalizers()
        .iter()
        .any(|f| f == platform_types::constants::FINALIZER)
    {
        return Ok(Action::await_change());
    }

    let namespace = platform.namespace().unwrap_or_default();
    let helm = ctx.helm.clone();

    let mut status = platform.status.clone().unwrap_or_default();
    status.phase = Phase::Terminating;
    let _ = patch_status(&ctx, &platform, status).await;

    let name_owned = name.clone();
    let done = tokio::task::spawn_blocking(move || {
        std::panic::catch_unwind(AssertUnwindSafe(|| crate::finalizer::teardown(helm.as_ref(), &name_owned, &namespace)))
    })
    .await
    .map_err(|source| Error::Fatal {
        message: format!("teardown task panicked: {source}"),
    })?
    .map_err(|_| Error::Fatal {
        message: "teardown panicked".to_string(),
    })??;

    if done {
        remove_finalizer(&ctx, &platform).await?;
        info!(platform = %name, "finalizer removed, teardown complete");
        Ok(Action::await_change())
    } else {
        Ok(Action::requeue(ctx.requeue.short))
    }
}

pub(crate) async fn reconcile(platform: Arc<Platform>, ctx: Arc<ControllerContext>) -> Result<Action, Error> {
    if platform.metadata.deletion_timestamp.is_some() {
        return handle_deletion(ctx, platform).await;
    }

    if ensure_finalizer(&ctx, &platform).await? {
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let result = reconcile_active(&platform, &ctx).await;

    if let Err(error) = &result {
        if let Some(reason) = error.condition_reason() {
            let message = error.to_string();
            let now = Utc::now().to_rfc3339();
            let mut status = platform.status.clone().unwrap_or_default();
            status.phase = Phase::Failed;
            status.message = message.clone();
            upsert_conditions(&mut status.conditions, &Phase::Failed, &now);
            set_error_condition(&mut status.conditions, reason, &message, &now);
            let _ = patch_status(&ctx, &platform, status).await;
        }
    }

    result
}

async fn reconcile_active(platform: &Platform, ctx: &ControllerContext) -> Result<Action, Error> {
    let generation = platform.metadata.generation.unwrap_or(0);
    let prior_observed_generation = platform.status.as_ref().map(|s| s.observed_generation).unwrap_or(0);
    let platform_name = platform.name_any();
    let namespace = platform.namespace().unwrap_or_default();

    let mut spec = platform.spec.clone();
    apply_defaults(&mut spec);

    let recorded = recorded_storage_sizes(ctx.helm.as_ref(), &platform_name, &namespace);
    let validation_errors = validate(&spec, &recorded);
    if !validation_errors.is_empty() {
        let message = validation_errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        warn!(platform = %platform_name, %message, "admission rejected");
        return Err(Error::Validation { message });
    }

    let helm = ctx.helm.clone();
    let platform_name_for_blocking = platform_name.clone();
    let namespace_for_blocking = namespace.clone();
    let spec_for_blocking = spec.clone();

    let outcomes = tokio::task::spawn_blocking(move || {
        let mut results = Vec::new();
        for key in COMPONENT_KEYS {
            let enabled = spec_for_blocking.enabled.is_enabled(key);
            let values = component_values(&spec_for_blocking, key)?;
            let target_version = component_version(&spec_for_blocking, key).unwrap_or("0.0.0");
            let manager = ComponentManager::new(key);
            let caught = std::panic::catch_unwind(AssertUnwindSafe(|| {
                manager.converge(
                    helm.as_ref(),
                    &platform_name_for_blocking,
                    &namespace_for_blocking,
                    enabled,
                    target_version,
                    &values,
                )
            }));
            match caught {
                Ok(Ok(outcome)) => results.push((key, outcome)),
                Ok(Err(error)) => return Err(error),
                Err(panic) => {
                    let message = panic_message(panic);
                    warn!(component = key, %message, "component manager panicked, continuing with remaining components");
                    results.push((key, ConvergeOutcome::InstallFailed(format!("panicked: {message}"))));
                }
            }
        }
        Ok::<_, Error>(results)
    })
    .await
    .map_err(|source| Error::Fatal {
        message: format!("convergence task panicked: {source}"),
    })??;

    let mut components = platform
        .status
        .as_ref()
        .map(|s| s.components.clone())
        .unwrap_or_default();
    let mut any_transient = false;
    for (key, outcome) in &outcomes {
        let (phase, message) = outcome_to_component_phase(outcome);
        let entry = components.entry((*key).to_string()).or_default();
        entry.phase = phase;
        entry.message = message;
        entry.last_update_time = Some(Utc::now().to_rfc3339());
        if matches!(
            outcome,
            ConvergeOutcome::InstallFailed(_) | ConvergeOutcome::UpgradeFailed { .. } | ConvergeOutcome::RemoveFailed(_)
        ) {
            any_transient = true;
        }
    }
    for key in COMPONENT_KEYS {
        if !spec.enabled.is_enabled(key) {
            components.remove(key);
        }
    }

    let phase = aggregate_phase(&spec.enabled, &components, prior_observed_generation, generation, false);

    let mut status = platform.status.clone().unwrap_or_default();
    status.phase = phase.clone();
    status.observed_generation = generation;
    status.components = components;
    status.message = format!("phase is {phase}");
    upsert_conditions(&mut status.conditions, &phase, &Utc::now().to_rfc3339());

    patch_status(ctx, platform, status).await?;

    let action = if any_transient {
        Action::requeue(ctx.requeue.short)
    } else if matches!(phase, Phase::Installing | Phase::Upgrading) {
        Action::requeue(ctx.requeue.medium)
    } else {
        Action::requeue(ctx.requeue.long)
    };
    Ok(action)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Ensures the CRD is installed at startup. Mirrors
/// `ensure_crd`: on a create failure we give up loudly rather than run
/// with an absent CRD, which would otherwise error-loop silently.
pub async fn ensure_crd(k8s: Client) {
    let crds: Api<CustomResourceDefinition> = Api::all(k8s);
    let name = "platforms.observability.platform.io";
    let list_params = ListParams::default().fields(&format!("metadata.name={name}"));
    let existing = crds.list(&list_params).await.expect("failed to list CRDs");

    if existing.items.is_empty() {
        let crd = Platform::crd();
        info!("creating CRD {name}");
        match crds.create(&PostParams::default(), &crd).await {
            Ok(created) => {
                info!(crd = ?created.name_any(), "created");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(source) => {
                error!(%source, "failed to create CRD");
                std::process::exit(1);
            }
        }
    } else {
        info!("CRD {name} present");
    }
}

pub(crate) fn error_policy(_platform: Arc<Platform>, error: &Error, ctx: Arc<ControllerContext>) -> Action {
    crate::metrics::record_error(error.metric_kind());
    let duration = match error {
        Error::Validation { .. } | Error::Incompatible { .. } | Error::Fatal { .. } => {
            return Action::await_change();
        }
        Error::Configuration { .. } => ctx.requeue.medium,
        _ => ctx.requeue.short,
    };
    warn!(%error, requeue_seconds = duration.as_secs(), "reconcile error, retrying");
    Action::requeue(duration)
}

pub async fn run(ctx: Arc<ControllerContext>) {
    ensure_crd(ctx.k8s.clone()).await;

    let api: Api<Platform> = Api::all(ctx.k8s.clone());
    Controller::new(api, watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => tracing::trace!(?action, "reconciled"),
                Err(error) => tracing::trace!(?error, "reconcile error"),
            }
        })
        .await;
}
