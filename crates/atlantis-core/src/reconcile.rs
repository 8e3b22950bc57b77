//! Local/remote reconciliation.
//!
//! The core never settles a conflict itself: any difference is handed to a
//! [`ConflictResolver`] together with the complete field report.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::diff::{diff, diff_observed, DiffReport};
use crate::error::{ConfigError, Result};
use crate::snapshot::DeploymentSnapshot;

/// Choice returned by a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    UseLocal,
    UseRemote,
    Cancel,
}

/// Why the resolver is being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// Both snapshots exist and differ
    Differs,
    /// Only the remote snapshot exists; `UseRemote` imports it
    RemoteOnly,
}

/// Decision point for conflicts, typically implemented by an interactive shell.
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: Conflict, report: &DiffReport) -> Resolution;
}

/// Resolver that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedResolver(pub Resolution);

impl ConflictResolver for FixedResolver {
    fn resolve(&mut self, _conflict: Conflict, _report: &DiffReport) -> Resolution {
        self.0
    }
}

/// Which snapshot reconciliation settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Keep the local snapshot (possibly none).
    Local(Option<DeploymentSnapshot>),
    /// Replace the local snapshot with the remote one.
    Remote(DeploymentSnapshot),
}

impl ReconcileOutcome {
    pub fn into_snapshot(self) -> Option<DeploymentSnapshot> {
        match self {
            ReconcileOutcome::Local(local) => local,
            ReconcileOutcome::Remote(remote) => Some(remote),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ReconcileOutcome::Remote(_))
    }
}

/// Settle which snapshot to proceed from for `stage`.
///
/// Returns [`ConfigError::Cancelled`] when the resolver cancels.
pub fn reconcile(
    local: Option<DeploymentSnapshot>,
    remote: Option<DeploymentSnapshot>,
    stage: &str,
    resolver: &mut dyn ConflictResolver,
) -> Result<ReconcileOutcome> {
    match (local, remote) {
        (Some(local), Some(remote)) => {
            let report = diff(&local, &remote, stage);
            if !report.has_differences {
                debug!("Local and remote configuration match for stage {}", stage);
                return Ok(ReconcileOutcome::Local(Some(local)));
            }
            info!(
                "{} field(s) differ between local and remote for stage {}",
                report.mismatch_count(),
                stage
            );
            match resolver.resolve(Conflict::Differs, &report) {
                Resolution::UseLocal => Ok(ReconcileOutcome::Local(Some(local))),
                Resolution::UseRemote => Ok(ReconcileOutcome::Remote(remote)),
                Resolution::Cancel => Err(ConfigError::Cancelled),
            }
        }
        (None, Some(remote)) => {
            let empty = DeploymentSnapshot::default();
            let report = diff_observed(&empty, Some(&remote), stage);
            match resolver.resolve(Conflict::RemoteOnly, &report) {
                Resolution::UseLocal => Ok(ReconcileOutcome::Local(None)),
                Resolution::UseRemote => Ok(ReconcileOutcome::Remote(remote)),
                Resolution::Cancel => Err(ConfigError::Cancelled),
            }
        }
        (local, None) => Ok(ReconcileOutcome::Local(local)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Deployment;

    /// Records how often it was consulted.
    struct Counting {
        answer: Resolution,
        calls: Vec<Conflict>,
    }

    impl ConflictResolver for Counting {
        fn resolve(&mut self, conflict: Conflict, report: &DiffReport) -> Resolution {
            assert!(report.has_differences || conflict == Conflict::RemoteOnly);
            self.calls.push(conflict);
            self.answer
        }
    }

    fn counting(answer: Resolution) -> Counting {
        Counting {
            answer,
            calls: Vec::new(),
        }
    }

    fn with_region(region: &str) -> DeploymentSnapshot {
        let mut deployment = Deployment::default();
        deployment
            .parameter_overrides
            .insert("Region".to_string(), region.to_string());
        let mut s = DeploymentSnapshot::default();
        s.deployments.insert("test".to_string(), deployment);
        s
    }

    #[test]
    fn test_matching_snapshots_skip_resolver() {
        let mut resolver = counting(Resolution::Cancel);
        let outcome = reconcile(
            Some(with_region("us-east-1")),
            Some(with_region("us-east-1")),
            "test",
            &mut resolver,
        )
        .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Local(Some(with_region("us-east-1"))));
        assert!(resolver.calls.is_empty());
    }

    #[test]
    fn test_conflict_use_remote() {
        let mut resolver = counting(Resolution::UseRemote);
        let outcome = reconcile(
            Some(with_region("us-east-1")),
            Some(with_region("us-west-2")),
            "test",
            &mut resolver,
        )
        .unwrap();
        assert!(outcome.is_remote());
        assert_eq!(outcome.into_snapshot(), Some(with_region("us-west-2")));
        assert_eq!(resolver.calls, vec![Conflict::Differs]);
    }

    #[test]
    fn test_conflict_use_local() {
        let outcome = reconcile(
            Some(with_region("us-east-1")),
            Some(with_region("us-west-2")),
            "test",
            &mut FixedResolver(Resolution::UseLocal),
        )
        .unwrap();
        assert_eq!(outcome.into_snapshot(), Some(with_region("us-east-1")));
    }

    #[test]
    fn test_cancel_aborts() {
        let err = reconcile(
            Some(with_region("us-east-1")),
            Some(with_region("us-west-2")),
            "test",
            &mut FixedResolver(Resolution::Cancel),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Cancelled));
    }

    #[test]
    fn test_remote_only_import() {
        let mut resolver = counting(Resolution::UseRemote);
        let outcome = reconcile(None, Some(with_region("us-west-2")), "test", &mut resolver).unwrap();
        assert_eq!(outcome, ReconcileOutcome::Remote(with_region("us-west-2")));
        assert_eq!(resolver.calls, vec![Conflict::RemoteOnly]);

        let outcome = reconcile(
            None,
            Some(with_region("us-west-2")),
            "test",
            &mut FixedResolver(Resolution::UseLocal),
        )
        .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Local(None));
    }

    #[test]
    fn test_no_remote_keeps_local() {
        let mut resolver = counting(Resolution::Cancel);
        let outcome = reconcile(Some(with_region("us-east-1")), None, "test", &mut resolver).unwrap();
        assert_eq!(outcome.into_snapshot(), Some(with_region("us-east-1")));

        let outcome = reconcile(None, None, "test", &mut resolver).unwrap();
        assert_eq!(outcome, ReconcileOutcome::Local(None));
        assert!(resolver.calls.is_empty());
    }
}
