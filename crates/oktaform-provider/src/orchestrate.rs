//! The host runtime: refresh, plan, apply, import and destroy.
//!
//! Refresh reads every tracked resource at full parallelism. Plan is pure:
//! it validates declarations, applies defaults and diffs against state.
//! Apply runs in dependency waves through a bounded worker pool. Deletes
//! run first in reverse wave order, then creates/updates/replaces in wave
//! order. State is flushed after every completed action.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;

use oktaform_core::{AttributeChange, ResourceData};

use crate::addr::ResourceAddr;
use crate::context::{Operation, ProviderContext, SiblingObservation};
use crate::declaration::{Declarations, ResourceDecl};
use crate::error::ProvisionerError;
use crate::persistence::StatePersistence;
use crate::plan::{Action, Plan, PlanEntry};
use crate::registry::Registry;
use crate::resource::Resource;
use crate::settings::Timeouts;
use crate::state::{ProviderState, ResourceRecord};

/// Outcome counts and failures of an apply or destroy.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub failures: Vec<(ResourceAddr, ProvisionerError)>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: usize,
    /// Records dropped because the remote entity is gone.
    pub vanished: Vec<ResourceAddr>,
}

// ── Refresh ──────────────────────────────────────────────────────

/// Re-read every tracked resource. Vanished resources are dropped from
/// state so the next plan recreates them.
pub async fn refresh(
    ctx: &ProviderContext,
    registry: &Registry,
    decls: &Declarations,
    state: &mut ProviderState,
    persistence: &StatePersistence,
) -> Result<RefreshReport, ProvisionerError> {
    let mut reads = Vec::new();
    for (addr, record) in &state.resources {
        let resource = registry.get(&addr.resource_type)?.clone();
        let timeouts = timeouts_for(ctx, decls.find(addr));
        reads.push((addr.clone(), resource, record.data.clone(), timeouts));
    }

    let parallelism = ctx.settings().parallelism.max(1);
    let mut results = stream::iter(reads.into_iter().map(|(addr, resource, data, timeouts)| async move {
        let op = ctx.operation(Operation::Read, timeouts.read);
        tracing::debug!(addr = %addr, "refreshing resource");
        let result = resource
            .read(&op, &data)
            .await
            .map_err(|e| e.with_resource(&addr.to_string(), "read"));
        (addr, result)
    }))
    .buffer_unordered(parallelism);

    let mut report = RefreshReport::default();
    let mut first_error = None;
    while let Some((addr, result)) = results.next().await {
        match result {
            Ok(Some(observed)) => {
                if let Some(record) = state.resources.get_mut(&addr) {
                    record.data = observed;
                }
                report.refreshed += 1;
            }
            Ok(None) => {
                tracing::warn!(addr = %addr, "resource no longer exists remotely, removing from state");
                state.resources.remove(&addr);
                report.vanished.push(addr);
            }
            Err(e) => {
                tracing::error!(addr = %addr, error = %e, "refresh failed");
                first_error.get_or_insert(e);
            }
        }
    }
    drop(results);

    state.touch();
    persistence.flush(state).await?;
    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

// ── Plan ─────────────────────────────────────────────────────────

/// Compare declarations against state and classify every address.
///
/// All validation happens here, before any API call.
pub fn plan(
    registry: &Registry,
    decls: &Declarations,
    state: &ProviderState,
) -> Result<Plan, ProvisionerError> {
    decls.check_addresses()?;
    let mut entries = Vec::new();

    for decl in &decls.resources {
        let addr = decl.addr();
        let entry = plan_one(registry, decl, state.resources.get(&addr))
            .map_err(|e| e.with_resource(&addr.to_string(), "plan"))?;
        entries.push(entry);
    }

    let declared: HashSet<ResourceAddr> = decls.resources.iter().map(|d| d.addr()).collect();
    for addr in state.resources.keys() {
        if !declared.contains(addr) {
            entries.push(PlanEntry {
                addr: addr.clone(),
                action: Action::Delete,
                changes: vec![],
                desired: None,
            });
        }
    }

    Ok(Plan { entries })
}

fn plan_one(
    registry: &Registry,
    decl: &ResourceDecl,
    record: Option<&ResourceRecord>,
) -> Result<PlanEntry, ProvisionerError> {
    let resource = registry.get(&decl.resource_type)?;
    let schema = resource.schema();
    let mut desired = decl.data();
    schema.validate(&desired)?;
    resource.validate(&desired)?;
    schema.apply_defaults(&mut desired);

    let addr = decl.addr();
    let Some(record) = record.filter(|r| r.data.id().is_some()) else {
        let changes = schema.diff(&desired, &ResourceData::new());
        return Ok(PlanEntry {
            addr,
            action: Action::Create,
            changes,
            desired: Some(desired),
        });
    };

    let changes: Vec<AttributeChange> = schema
        .diff(&desired, &record.data)
        .into_iter()
        .filter(|c| !resource.suppress_diff(c, &desired, &record.data))
        .collect();
    let action = if changes.is_empty() {
        Action::NoOp
    } else if changes.iter().any(|c| c.force_new) {
        Action::Replace
    } else {
        Action::Update
    };
    Ok(PlanEntry {
        addr,
        action,
        changes,
        desired: Some(desired),
    })
}

// ── Apply ────────────────────────────────────────────────────────

struct Job {
    addr: ResourceAddr,
    action: Action,
    resource: Arc<dyn Resource>,
    desired: Option<ResourceData>,
    prior: Option<ResourceData>,
    timeouts: Timeouts,
}

struct JobOutcome {
    addr: ResourceAddr,
    action: Action,
    /// `Some` = new observed image, `None` = resource deleted.
    result: Result<Option<ResourceData>, ProvisionerError>,
    observations: Vec<SiblingObservation>,
}

/// Execute every actionable entry of `plan`.
///
/// A failure stops later waves from starting; operations already running
/// in the failing wave finish and are recorded. Nothing is rolled back.
pub async fn apply(
    ctx: &ProviderContext,
    registry: &Registry,
    decls: &Declarations,
    plan: &Plan,
    state: &mut ProviderState,
    persistence: &StatePersistence,
) -> Result<ApplyReport, ProvisionerError> {
    let mut report = ApplyReport::default();

    // Deletes: reverse dependency order over the recorded edges.
    let deletes: Vec<&PlanEntry> = plan
        .entries
        .iter()
        .filter(|e| e.action == Action::Delete)
        .collect();
    let delete_graph: Vec<(ResourceAddr, Vec<ResourceAddr>)> = deletes
        .iter()
        .map(|e| {
            let deps = state
                .resources
                .get(&e.addr)
                .map(|r| r.depends_on.clone())
                .unwrap_or_default();
            (e.addr.clone(), deps)
        })
        .collect();
    for wave in waves(&delete_graph)?.into_iter().rev() {
        let jobs = wave
            .iter()
            .filter_map(|addr| plan.get(addr))
            .map(|entry| job_for(ctx, registry, decls, state, entry))
            .collect::<Result<Vec<_>, _>>()?;
        run_wave(ctx, jobs, decls, state, persistence, &mut report).await?;
        if !report.is_success() {
            return Ok(report);
        }
    }

    // Creates, updates, replaces: declared dependency order.
    let changing: HashSet<&ResourceAddr> = plan
        .entries
        .iter()
        .filter(|e| matches!(e.action, Action::Create | Action::Update | Action::Replace))
        .map(|e| &e.addr)
        .collect();
    let graph: Vec<(ResourceAddr, Vec<ResourceAddr>)> = decls
        .resources
        .iter()
        .map(|d| (d.addr(), d.depends_on.clone()))
        .collect();
    for wave in waves(&graph)? {
        let jobs = wave
            .iter()
            .filter(|addr| changing.contains(addr))
            .filter_map(|addr| plan.get(addr))
            .map(|entry| job_for(ctx, registry, decls, state, entry))
            .collect::<Result<Vec<_>, _>>()?;
        if jobs.is_empty() {
            continue;
        }
        run_wave(ctx, jobs, decls, state, persistence, &mut report).await?;
        if !report.is_success() {
            return Ok(report);
        }
    }

    Ok(report)
}

/// Delete every tracked resource, dependents first.
pub async fn destroy_all(
    ctx: &ProviderContext,
    registry: &Registry,
    decls: &Declarations,
    state: &mut ProviderState,
    persistence: &StatePersistence,
) -> Result<ApplyReport, ProvisionerError> {
    let plan = Plan {
        entries: state
            .resources
            .keys()
            .map(|addr| PlanEntry {
                addr: addr.clone(),
                action: Action::Delete,
                changes: vec![],
                desired: None,
            })
            .collect(),
    };
    let empty = Declarations {
        provider: decls.provider.clone(),
        resources: vec![],
    };
    apply(ctx, registry, &empty, &plan, state, persistence).await
}

fn job_for(
    ctx: &ProviderContext,
    registry: &Registry,
    decls: &Declarations,
    state: &ProviderState,
    entry: &PlanEntry,
) -> Result<Job, ProvisionerError> {
    Ok(Job {
        addr: entry.addr.clone(),
        action: entry.action,
        resource: registry.get(&entry.addr.resource_type)?.clone(),
        desired: entry.desired.clone(),
        prior: state.resources.get(&entry.addr).map(|r| r.data.clone()),
        timeouts: timeouts_for(ctx, decls.find(&entry.addr)),
    })
}

fn timeouts_for(ctx: &ProviderContext, decl: Option<&ResourceDecl>) -> Timeouts {
    let defaults = ctx.settings().timeouts;
    match decl {
        Some(d) => defaults.overlay(&d.timeouts),
        None => defaults,
    }
}

async fn run_wave(
    ctx: &ProviderContext,
    jobs: Vec<Job>,
    decls: &Declarations,
    state: &mut ProviderState,
    persistence: &StatePersistence,
    report: &mut ApplyReport,
) -> Result<(), ProvisionerError> {
    let parallelism = ctx.settings().parallelism.max(1);
    let mut outcomes = stream::iter(jobs.into_iter().map(|job| run_job(ctx, job)))
        .buffer_unordered(parallelism);

    while let Some(outcome) = outcomes.next().await {
        let JobOutcome {
            addr,
            action,
            result,
            observations,
        } = outcome;

        match result {
            Ok(Some(observed)) => {
                let depends_on = decls
                    .find(&addr)
                    .map(|d| d.depends_on.clone())
                    .unwrap_or_default();
                state.resources.insert(
                    addr.clone(),
                    ResourceRecord {
                        depends_on,
                        data: observed,
                    },
                );
                match action {
                    Action::Create => report.created += 1,
                    Action::Replace => report.replaced += 1,
                    _ => report.updated += 1,
                }
            }
            Ok(None) => {
                state.resources.remove(&addr);
                report.deleted += 1;
            }
            Err(e) => {
                tracing::error!(addr = %addr, error = %e, "operation failed");
                report.failures.push((addr.clone(), e));
            }
        }

        for observation in &observations {
            state.apply_observation(observation, &addr);
        }

        state.touch();
        persistence.flush(state).await?;
    }
    Ok(())
}

async fn run_job(ctx: &ProviderContext, job: Job) -> JobOutcome {
    let Job {
        addr,
        action,
        resource,
        desired,
        prior,
        timeouts,
    } = job;
    let label = addr.to_string();
    let mut observations = Vec::new();

    let result = match (action, desired.as_ref(), prior.as_ref()) {
        (Action::Create, Some(desired), _) => {
            tracing::info!(addr = %addr, "creating resource");
            let op = ctx.operation(Operation::Create, timeouts.create);
            let result = resource.create(&op, desired).await;
            observations.extend(op.take_observations());
            result
                .and_then(require_id)
                .map(Some)
                .map_err(|e| e.with_resource(&label, "create"))
        }
        (Action::Update, Some(desired), Some(prior)) => {
            tracing::info!(addr = %addr, "updating resource");
            let op = ctx.operation(Operation::Update, timeouts.update);
            let result = resource.update(&op, desired, prior).await;
            observations.extend(op.take_observations());
            result
                .map(Some)
                .map_err(|e| match e {
                    ProvisionerError::NotFound(msg) => {
                        ProvisionerError::NotFound(format!("resource vanished: {msg}"))
                    }
                    other => other,
                })
                .map_err(|e| e.with_resource(&label, "update"))
        }
        (Action::Replace, Some(desired), Some(prior)) => {
            tracing::info!(addr = %addr, "replacing resource");
            let delete_op = ctx.operation(Operation::Delete, timeouts.delete);
            let deleted = resource.delete(&delete_op, prior).await;
            observations.extend(delete_op.take_observations());
            match deleted {
                Err(e) => Err(e.with_resource(&label, "delete")),
                Ok(()) => {
                    let create_op = ctx.operation(Operation::Create, timeouts.create);
                    let created = resource.create(&create_op, desired).await;
                    observations.extend(create_op.take_observations());
                    created
                        .and_then(require_id)
                        .map(Some)
                        .map_err(|e| e.with_resource(&label, "create"))
                }
            }
        }
        (Action::Delete, _, Some(prior)) => {
            tracing::info!(addr = %addr, "destroying resource");
            let op = ctx.operation(Operation::Delete, timeouts.delete);
            let result = resource.delete(&op, prior).await;
            observations.extend(op.take_observations());
            result
                .map(|()| None)
                .map_err(|e| e.with_resource(&label, "delete"))
        }
        (action, _, _) => Err(ProvisionerError::State(format!(
            "{label}: nothing to {action:?} (missing declaration or state)"
        ))),
    };

    JobOutcome {
        addr,
        action,
        result,
        observations,
    }
}

fn require_id(data: ResourceData) -> Result<ResourceData, ProvisionerError> {
    match data.id() {
        Some(_) => Ok(data),
        None => Err(ProvisionerError::State(
            "create returned no remote ID".into(),
        )),
    }
}

/// Group nodes into waves: every node comes after all of its
/// dependencies. Edges to nodes outside `graph` are ignored.
pub fn waves(
    graph: &[(ResourceAddr, Vec<ResourceAddr>)],
) -> Result<Vec<Vec<ResourceAddr>>, ProvisionerError> {
    let nodes: HashMap<&ResourceAddr, &Vec<ResourceAddr>> =
        graph.iter().map(|(a, deps)| (a, deps)).collect();
    let mut depth: BTreeMap<&ResourceAddr, usize> = BTreeMap::new();

    fn visit<'a>(
        addr: &'a ResourceAddr,
        nodes: &HashMap<&'a ResourceAddr, &'a Vec<ResourceAddr>>,
        depth: &mut BTreeMap<&'a ResourceAddr, usize>,
        path: &mut Vec<&'a ResourceAddr>,
    ) -> Result<usize, ProvisionerError> {
        if let Some(d) = depth.get(addr) {
            return Ok(*d);
        }
        if path.contains(&addr) {
            return Err(ProvisionerError::PreconditionViolated(format!(
                "dependency cycle through {addr}"
            )));
        }
        path.push(addr);
        let mut d = 0;
        if let Some(deps) = nodes.get(addr) {
            for dep in deps.iter() {
                if nodes.contains_key(dep) {
                    d = d.max(visit(dep, nodes, depth, path)? + 1);
                }
            }
        }
        path.pop();
        depth.insert(addr, d);
        Ok(d)
    }

    for (addr, _) in graph {
        visit(addr, &nodes, &mut depth, &mut Vec::new())?;
    }

    let levels = depth.values().copied().max().map_or(0, |m| m + 1);
    let mut out = vec![Vec::new(); levels];
    for (addr, _) in graph {
        out[depth[addr]].push(addr.clone());
    }
    Ok(out)
}

// ── Import ───────────────────────────────────────────────────────

/// Bring an existing remote entity under management at `addr`.
pub async fn import(
    ctx: &ProviderContext,
    registry: &Registry,
    addr: &ResourceAddr,
    id: &str,
    state: &mut ProviderState,
    persistence: &StatePersistence,
) -> Result<ResourceData, ProvisionerError> {
    let label = addr.to_string();
    if state.resources.contains_key(addr) {
        return Err(ProvisionerError::PreconditionViolated(format!(
            "{label} is already managed"
        )));
    }
    let resource = registry.get(&addr.resource_type)?;
    let seed = resource
        .import(id)
        .map_err(|e| e.with_resource(&label, "import"))?;

    let op = ctx.operation(Operation::Import, ctx.settings().timeouts.read);
    tracing::info!(addr = %addr, id = %id, "importing resource");
    let observed = resource
        .read(&op, &seed)
        .await
        .map_err(|e| e.with_resource(&label, "import"))?
        .ok_or_else(|| {
            ProvisionerError::NotFound(format!(
                "{label} (import): cannot import non-existent remote object \"{id}\""
            ))
        })?;

    state.resources.insert(
        addr.clone(),
        ResourceRecord {
            depends_on: vec![],
            data: observed.clone(),
        },
    );
    state.touch();
    persistence.flush(state).await?;
    Ok(observed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(s: &str) -> ResourceAddr {
        s.parse().unwrap()
    }

    #[test]
    fn waves_follow_dependencies() {
        let graph = vec![
            (a("okta_user_schema_property.nick"), vec![a("okta_user_type.contractor")]),
            (a("okta_user_type.contractor"), vec![]),
            (a("okta_network_zone.office"), vec![]),
            (
                a("okta_user.alice"),
                vec![a("okta_user_schema_property.nick"), a("okta_user_type.contractor")],
            ),
        ];
        let waves = waves(&graph).unwrap();
        assert_eq!(
            waves,
            vec![
                vec![a("okta_user_type.contractor"), a("okta_network_zone.office")],
                vec![a("okta_user_schema_property.nick")],
                vec![a("okta_user.alice")],
            ]
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let graph = vec![
            (a("okta_user.a"), vec![a("okta_user.b")]),
            (a("okta_user.b"), vec![a("okta_user.a")]),
        ];
        assert!(matches!(
            waves(&graph),
            Err(ProvisionerError::PreconditionViolated(_))
        ));
    }

    #[test]
    fn edges_outside_graph_are_ignored() {
        let graph = vec![(a("okta_user.a"), vec![a("okta_user.gone")])];
        assert_eq!(waves(&graph).unwrap(), vec![vec![a("okta_user.a")]]);
    }
}
