//! Reconciliation of local and remote record sets.
//!
//! [`merge`] produces the union of both sides keyed by record id. Records
//! present on only one side are carried over unchanged. Records present on
//! both sides with different contents are conflicts, resolved by a
//! [`ConflictPolicy`].

use crate::entity::Entity;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Rule applied when a record differs between the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The remote version is kept.
    #[default]
    RemoteWins,
    /// The local version is kept.
    LocalWins,
    /// The version with the later modification time is kept.
    ///
    /// Ties, and records that do not track modification time, fall back to
    /// the remote version.
    LastModifiedWins,
}

impl ConflictPolicy {
    /// Returns the configuration name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::RemoteWins => "remote_wins",
            ConflictPolicy::LocalWins => "local_wins",
            ConflictPolicy::LastModifiedWins => "last_modified_wins",
        }
    }

    /// Picks the surviving version of a conflicting record.
    pub fn resolve<'a, T: Entity>(&self, local: &'a T, remote: &'a T) -> &'a T {
        match self {
            ConflictPolicy::RemoteWins => remote,
            ConflictPolicy::LocalWins => local,
            ConflictPolicy::LastModifiedWins => match (local.updated_at(), remote.updated_at()) {
                (Some(l), Some(r)) if l > r => local,
                _ => remote,
            },
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote_wins" => Ok(ConflictPolicy::RemoteWins),
            "local_wins" => Ok(ConflictPolicy::LocalWins),
            "last_modified_wins" => Ok(ConflictPolicy::LastModifiedWins),
            other => Err(CoreError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Result of reconciling two record sets.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<T> {
    /// The merged records: local order first, then remote-only records in
    /// remote order.
    pub records: Vec<T>,
    /// Number of records present only locally.
    pub local_only: usize,
    /// Number of records present only remotely.
    pub remote_only: usize,
    /// Ids of records that differed between the two sides.
    pub conflicts: Vec<Uuid>,
    /// Number of records present and equal on both sides.
    pub identical: usize,
}

impl<T> MergeOutcome<T> {
    /// Returns true if neither side needs to change.
    pub fn is_converged(&self) -> bool {
        self.local_only == 0 && self.remote_only == 0 && self.conflicts.is_empty()
    }
}

/// Merges local and remote records into one set.
///
/// Within one side a repeated id keeps its first position and its last
/// contents.
pub fn merge<T: Entity>(local: &[T], remote: &[T], policy: ConflictPolicy) -> MergeOutcome<T> {
    let local = dedup_by_id(local);
    let remote = dedup_by_id(remote);

    let remote_index: HashMap<Uuid, usize> = remote
        .iter()
        .enumerate()
        .map(|(i, record)| (record.id(), i))
        .collect();

    let mut records = Vec::with_capacity(local.len().max(remote.len()));
    let mut matched = vec![false; remote.len()];
    let mut conflicts = Vec::new();
    let mut local_only = 0;
    let mut identical = 0;

    for record in &local {
        match remote_index.get(&record.id()) {
            Some(&i) => {
                matched[i] = true;
                let other = &remote[i];
                if record == other {
                    identical += 1;
                    records.push(record.clone());
                } else {
                    conflicts.push(record.id());
                    records.push(policy.resolve(record, other).clone());
                }
            }
            None => {
                local_only += 1;
                records.push(record.clone());
            }
        }
    }

    let mut remote_only = 0;
    for (record, seen) in remote.iter().zip(&matched) {
        if !seen {
            remote_only += 1;
            records.push(record.clone());
        }
    }

    MergeOutcome {
        records,
        local_only,
        remote_only,
        conflicts,
        identical,
    }
}

fn dedup_by_id<T: Entity>(records: &[T]) -> Vec<T> {
    let mut positions: HashMap<Uuid, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<T> = Vec::with_capacity(records.len());
    for record in records {
        match positions.get(&record.id()) {
            Some(&i) => out[i] = record.clone(),
            None => {
                positions.insert(record.id(), out.len());
                out.push(record.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn task(n: u128, title: &str) -> Task {
        Task::new(title).with_id(Uuid::from_u128(n))
    }

    #[test]
    fn union_keeps_one_sided_records() {
        let local = vec![task(1, "a"), task(2, "b")];
        let remote = vec![local[1].clone(), task(3, "c")];

        let out = merge(&local, &remote, ConflictPolicy::RemoteWins);
        let ids: Vec<_> = out.records.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]);
        assert_eq!(out.local_only, 1);
        assert_eq!(out.remote_only, 1);
        assert_eq!(out.identical, 1);
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn policies_resolve_conflicts() {
        let now = Utc::now();
        let local = task(7, "local edit").with_updated_at(now);
        let remote = task(7, "remote edit").with_updated_at(now - Duration::minutes(5));

        let pick = |policy| merge(&[local.clone()], &[remote.clone()], policy).records[0].title.clone();
        assert_eq!(pick(ConflictPolicy::RemoteWins), "remote edit");
        assert_eq!(pick(ConflictPolicy::LocalWins), "local edit");
        assert_eq!(pick(ConflictPolicy::LastModifiedWins), "local edit");
    }

    #[test]
    fn last_modified_tie_prefers_remote() {
        let now = Utc::now();
        let local = task(7, "local").with_updated_at(now);
        let remote = task(7, "remote").with_updated_at(now);
        let out = merge(&[local], &[remote], ConflictPolicy::LastModifiedWins);
        assert_eq!(out.records[0].title, "remote");
        assert_eq!(out.conflicts, vec![Uuid::from_u128(7)]);
    }

    #[test]
    fn duplicate_ids_keep_last_contents() {
        let local = vec![task(1, "first"), task(2, "x"), task(1, "second")];
        let out = merge(&local, &[], ConflictPolicy::RemoteWins);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].title, "second");
    }

    #[test]
    fn policy_names() {
        for policy in [
            ConflictPolicy::RemoteWins,
            ConflictPolicy::LocalWins,
            ConflictPolicy::LastModifiedWins,
        ] {
            assert_eq!(policy.as_str().parse::<ConflictPolicy>().unwrap(), policy);
            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(json, format!("\"{}\"", policy.as_str()));
        }
        assert!(matches!(
            "newest".parse::<ConflictPolicy>(),
            Err(CoreError::UnknownPolicy(_))
        ));
    }

    fn side() -> impl Strategy<Value = Vec<Task>> {
        prop::collection::vec((0u128..16, "[a-z]{1,6}"), 0..12).prop_map(|items| {
            items
                .into_iter()
                .map(|(n, title)| task(n, &title))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn merged_ids_are_the_union(local in side(), remote in side()) {
            let out = merge(&local, &remote, ConflictPolicy::RemoteWins);

            let expected: HashSet<Uuid> = local.iter().chain(&remote).map(|t| t.id).collect();
            let actual: Vec<Uuid> = out.records.iter().map(|t| t.id).collect();
            let unique: HashSet<Uuid> = actual.iter().copied().collect();

            prop_assert_eq!(unique.len(), actual.len());
            prop_assert_eq!(unique, expected);
        }

        #[test]
        fn merge_is_idempotent(local in side(), remote in side()) {
            let first = merge(&local, &remote, ConflictPolicy::RemoteWins);
            let again = merge(&first.records, &first.records, ConflictPolicy::RemoteWins);
            prop_assert!(again.is_converged());
            prop_assert_eq!(again.records, first.records);
        }
    }
}
