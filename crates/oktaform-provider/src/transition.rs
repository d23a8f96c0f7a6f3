//! Ordering of lifecycle transitions relative to payload mutation.
//!
//! Activation-bearing entities expose status as a separate set of
//! lifecycle endpoints. An update that touches both status and fields must
//! deactivate before mutating and activate after mutating, so the payload
//! write always lands on an inactive entity when one side of the change
//! is inactive.

use std::future::Future;

use oktaform_client::ApiRequest;
use oktaform_core::LifecycleStatus;

use crate::context::OpContext;
use crate::error::ProvisionerError;

pub const DEPROVISIONED_UPDATE: &str = "Only the status of a DEPROVISIONED user can be updated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activate,
    Deactivate,
    Suspend,
    Unsuspend,
}

impl Transition {
    /// Final path segment of the lifecycle endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Suspend => "suspend",
            Self::Unsuspend => "unsuspend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Transition(Transition),
    Mutate,
}

/// Ordered calls for one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusPlan {
    pub steps: Vec<Step>,
    /// Both a status change and a field change are carried by this update.
    pub additional_changes: bool,
}

impl StatusPlan {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn mutates(&self) -> bool {
        self.steps.contains(&Step::Mutate)
    }
}

/// Plan an update for an `ACTIVE`/`INACTIVE` entity.
pub fn plan_binary(
    prior: LifecycleStatus,
    desired: LifecycleStatus,
    fields_changed: bool,
) -> StatusPlan {
    use LifecycleStatus::{Active, Inactive};
    use Step::{Mutate, Transition as T};

    let steps = match (prior, desired, fields_changed) {
        (p, d, false) if p == d => vec![],
        (Active, Inactive, false) => vec![T(Transition::Deactivate)],
        (Active, Inactive, true) => vec![T(Transition::Deactivate), Mutate],
        (Inactive, Active, false) => vec![T(Transition::Activate)],
        (Inactive, Active, true) => vec![Mutate, T(Transition::Activate)],
        (_, d, changed) => {
            // Any other observed status (e.g. a drifted value the API
            // reported) converges through a single transition.
            let mut steps = Vec::new();
            if changed {
                steps.push(Mutate);
            }
            if prior != d {
                steps.push(T(if d == Active {
                    Transition::Activate
                } else {
                    Transition::Deactivate
                }));
            }
            steps
        }
    };
    let additional_changes = fields_changed && prior != desired;
    StatusPlan {
        steps,
        additional_changes,
    }
}

/// Plan an update for a user.
///
/// `DEPROVISIONED` is a sink: fields cannot change while the user is or
/// stays there, and leaving it requires an activation before any mutation.
/// Credential sub-states of an active account plan as `ACTIVE`.
pub fn plan_user(
    prior: LifecycleStatus,
    desired: LifecycleStatus,
    fields_changed: bool,
) -> Result<StatusPlan, ProvisionerError> {
    use LifecycleStatus::*;
    use Transition::*;

    let (prior, desired) = (prior.settled(), desired.settled());

    if fields_changed && desired == Deprovisioned {
        return Err(ProvisionerError::UpdateForbidden(DEPROVISIONED_UPDATE.into()));
    }

    let transitions: Vec<Transition> = if prior == desired {
        vec![]
    } else {
        match (prior, desired) {
            (Staged, Deprovisioned) => vec![Activate, Deactivate],
            (_, Deprovisioned) => vec![Deactivate],
            (Suspended, Active) => vec![Unsuspend],
            (Staged | Deprovisioned, Active) => vec![Activate],
            (Active, Suspended) => vec![Suspend],
            (Staged | Deprovisioned, Suspended) => vec![Activate, Suspend],
            (_, Staged) => {
                return Err(ProvisionerError::UpdateForbidden(format!(
                    "a user in status {prior} cannot be moved back to STAGED"
                )));
            }
            (p, d) => {
                return Err(ProvisionerError::UpdateForbidden(format!(
                    "cannot transition user from {p} to {d}"
                )));
            }
        }
    };

    let lifecycle = transitions.iter().copied().map(Step::Transition);
    let steps: Vec<Step> = match (fields_changed, prior == Deprovisioned) {
        (false, _) => lifecycle.collect(),
        (true, true) => lifecycle.chain([Step::Mutate]).collect(),
        (true, false) => std::iter::once(Step::Mutate).chain(lifecycle).collect(),
    };
    Ok(StatusPlan {
        additional_changes: fields_changed && !transitions.is_empty(),
        steps,
    })
}

/// Execute `plan` in order. `transition` builds the lifecycle request;
/// `mutate` issues the payload write and yields its result.
///
/// Each failing step is named in the error. Completed steps are never
/// rolled back.
pub async fn execute<T, M, Fut, L>(
    ctx: &OpContext,
    plan: &StatusPlan,
    transition: L,
    mutate: M,
) -> Result<Option<T>, ProvisionerError>
where
    L: Fn(Transition) -> ApiRequest,
    M: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ProvisionerError>>,
{
    let mut mutate = Some(mutate);
    let mut mutated = None;
    for step in &plan.steps {
        match step {
            Step::Transition(t) => {
                tracing::debug!(transition = t.as_str(), "lifecycle transition");
                ctx.send(transition(*t))
                    .await
                    .map_err(|e| e.prefixed(t.as_str()))?;
            }
            Step::Mutate => {
                if let Some(m) = mutate.take() {
                    mutated = Some(m().await.map_err(|e| e.prefixed("mutate"))?);
                }
            }
        }
    }
    Ok(mutated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleStatus::*;
    use Step::Mutate;

    fn t(t: Transition) -> Step {
        Step::Transition(t)
    }

    #[test]
    fn unchanged_is_noop() {
        let plan = plan_binary(Active, Active, false);
        assert!(plan.is_noop());
        assert!(!plan.additional_changes);
    }

    #[test]
    fn deactivate_precedes_mutation() {
        let plan = plan_binary(Active, Inactive, true);
        assert_eq!(plan.steps, vec![t(Transition::Deactivate), Mutate]);
        assert!(plan.additional_changes);
    }

    #[test]
    fn deactivate_only() {
        let plan = plan_binary(Active, Inactive, false);
        assert_eq!(plan.steps, vec![t(Transition::Deactivate)]);
        assert!(!plan.additional_changes);
    }

    #[test]
    fn activate_only() {
        let plan = plan_binary(Inactive, Active, false);
        assert_eq!(plan.steps, vec![t(Transition::Activate)]);
        assert!(!plan.additional_changes);
    }

    #[test]
    fn activation_follows_mutation() {
        let plan = plan_binary(Inactive, Active, true);
        assert_eq!(plan.steps, vec![Mutate, t(Transition::Activate)]);
        assert!(plan.additional_changes);
    }

    #[test]
    fn same_status_with_changes_mutates_only() {
        for status in [Active, Inactive] {
            let plan = plan_binary(status, status, true);
            assert_eq!(plan.steps, vec![Mutate]);
            assert!(!plan.additional_changes);
        }
    }

    #[test]
    fn deprovisioned_user_rejects_field_changes() {
        let err = plan_user(Deprovisioned, Deprovisioned, true).unwrap_err();
        assert_eq!(err.to_string(), DEPROVISIONED_UPDATE);
        assert!(matches!(
            plan_user(Active, Deprovisioned, true),
            Err(ProvisionerError::UpdateForbidden(_))
        ));
    }

    #[test]
    fn staged_user_transits_to_deprovisioned() {
        let plan = plan_user(Staged, Deprovisioned, false).unwrap();
        assert_eq!(
            plan.steps,
            vec![t(Transition::Activate), t(Transition::Deactivate)]
        );
    }

    #[test]
    fn leaving_deprovisioned_activates_before_mutating() {
        let plan = plan_user(Deprovisioned, Active, true).unwrap();
        assert_eq!(plan.steps, vec![t(Transition::Activate), Mutate]);
        assert!(plan.additional_changes);
    }

    #[test]
    fn suspend_and_unsuspend() {
        assert_eq!(
            plan_user(Active, Suspended, false).unwrap().steps,
            vec![t(Transition::Suspend)]
        );
        assert_eq!(
            plan_user(Suspended, Active, true).unwrap().steps,
            vec![Mutate, t(Transition::Unsuspend)]
        );
        assert_eq!(
            plan_user(Staged, Suspended, false).unwrap().steps,
            vec![t(Transition::Activate), t(Transition::Suspend)]
        );
    }

    #[test]
    fn cannot_return_to_staged() {
        assert!(matches!(
            plan_user(Active, Staged, false),
            Err(ProvisionerError::UpdateForbidden(_))
        ));
    }

    #[test]
    fn credential_states_plan_as_active() {
        for status in [Provisioned, Recovery, LockedOut, PasswordExpired] {
            assert!(plan_user(status, Active, false).unwrap().is_noop(), "{status}");
            let plan = plan_user(status, Active, true).unwrap();
            assert_eq!(plan.steps, vec![Mutate], "{status}");
            assert!(!plan.additional_changes);
            assert_eq!(
                plan_user(status, Suspended, false).unwrap().steps,
                vec![t(Transition::Suspend)]
            );
        }
    }

    #[test]
    fn deprovisioned_status_only_change_is_allowed() {
        let plan = plan_user(Deprovisioned, Active, false).unwrap();
        assert_eq!(plan.steps, vec![t(Transition::Activate)]);
    }
}
