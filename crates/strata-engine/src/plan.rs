//! Reconciliation of the source catalog against the tracking table.
//!
//! Everything here is pure: given a [`MigrationSet`] and the applied records,
//! decide whether the pair is consistent and which migrations an operation
//! should run, in order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strata_core::{AppliedRecord, Migration, MigrationSet, StrataError, StrataResult};

/// How many applied migrations a revert covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownLimit {
    /// At most this many, most recent first.
    Count(usize),
    /// Every applied migration.
    All,
}

/// One row of [`Engine::status`](crate::Engine::status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: u64,
    pub name: String,
    /// When the migration was applied, or `None` if it is pending.
    pub applied_at: Option<DateTime<Utc>>,
    /// Whether a backward migration exists for this version.
    pub reversible: bool,
}

impl MigrationStatus {
    pub const fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Checks that the applied versions are exactly the first `n` forward
/// migrations of `set`.
///
/// `applied` must be ascending by version, as drivers return it.
pub fn check_prefix(set: &MigrationSet, applied: &[AppliedRecord]) -> StrataResult<()> {
    if applied.len() > set.len() {
        let known: Vec<u64> = set.forward().map(|m| m.version).collect();
        let unknown: Vec<u64> = applied
            .iter()
            .map(|r| r.version)
            .filter(|v| !known.contains(v))
            .collect();
        return Err(StrataError::ConfigurationError(format!(
            "the database records {} applied migrations but the source only has {} \
             (unknown versions: {unknown:?})",
            applied.len(),
            set.len()
        )));
    }

    for (record, expected) in applied.iter().zip(set.forward()) {
        if record.version == expected.version {
            continue;
        }
        if set.up(record.version).is_none() {
            return Err(StrataError::ConfigurationError(format!(
                "applied migration {} ({}) is not present in the source",
                record.version, record.name
            )));
        }
        return Err(StrataError::ConfigurationError(format!(
            "migration {} ({}) is not applied but later migration {} ({}) is",
            expected.version, expected.name, record.version, record.name
        )));
    }
    Ok(())
}

/// Forward migrations to run: the pending ones, ascending, at most `limit`
/// (`0` means all).
pub fn plan_up(set: &MigrationSet, applied: &[AppliedRecord], limit: usize) -> Vec<Migration> {
    let pending = set.forward().skip(applied.len());
    if limit == 0 {
        pending.cloned().collect()
    } else {
        pending.take(limit).cloned().collect()
    }
}

/// Backward migrations to run: the applied ones, most recent first, limited
/// by `limit`.
///
/// # Errors
///
/// Returns [`StrataError::ConfigurationError`] if any selected version has no
/// backward migration. Nothing should run in that case.
pub fn plan_down(
    set: &MigrationSet,
    applied: &[AppliedRecord],
    limit: DownLimit,
) -> StrataResult<Vec<Migration>> {
    let take = match limit {
        DownLimit::Count(n) => n,
        DownLimit::All => applied.len(),
    };

    let selected: Vec<&AppliedRecord> = applied.iter().rev().take(take).collect();
    let irreversible: Vec<u64> = selected
        .iter()
        .filter(|r| set.backward(r.version).is_none())
        .map(|r| r.version)
        .collect();
    if !irreversible.is_empty() {
        return Err(StrataError::ConfigurationError(format!(
            "cannot revert: no down migration for version(s) {irreversible:?}"
        )));
    }

    Ok(selected
        .into_iter()
        .filter_map(|r| set.backward(r.version).cloned())
        .collect())
}

/// Every forward migration with its applied state.
pub fn status(set: &MigrationSet, applied: &[AppliedRecord]) -> Vec<MigrationStatus> {
    set.forward()
        .map(|m| MigrationStatus {
            version: m.version,
            name: m.name.clone(),
            applied_at: applied
                .iter()
                .find(|r| r.version == m.version)
                .map(|r| r.applied_at),
            reversible: set.backward(m.version).is_some(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(versions: &[u64], reversible: bool) -> MigrationSet {
        let mut migrations = Vec::new();
        for &v in versions {
            migrations.push(Migration::up(v, format!("m{v}"), format!("UP {v}")));
            if reversible {
                migrations.push(Migration::down(v, format!("m{v}"), format!("DOWN {v}")));
            }
        }
        MigrationSet::new(migrations).unwrap()
    }

    fn applied(versions: &[u64]) -> Vec<AppliedRecord> {
        versions
            .iter()
            .map(|&v| AppliedRecord::from_unix(v, format!("m{v}"), 1_700_000_000))
            .collect()
    }

    fn versions(work: &[Migration]) -> Vec<u64> {
        work.iter().map(|m| m.version).collect()
    }

    // ── Prefix check ────────────────────────────────────────────────

    #[test]
    fn test_prefix_ok() {
        let set = catalog(&[1, 2, 3], true);
        assert!(check_prefix(&set, &[]).is_ok());
        assert!(check_prefix(&set, &applied(&[1, 2])).is_ok());
        assert!(check_prefix(&set, &applied(&[1, 2, 3])).is_ok());
    }

    #[test]
    fn test_prefix_gap() {
        let set = catalog(&[1, 2, 3], true);
        let err = check_prefix(&set, &applied(&[1, 3])).unwrap_err();
        assert!(matches!(err, StrataError::ConfigurationError(_)));
        assert!(err.to_string().contains("migration 2"));
    }

    #[test]
    fn test_prefix_unknown_version() {
        let set = catalog(&[1, 2, 3], true);
        let err = check_prefix(&set, &applied(&[1, 7])).unwrap_err();
        assert!(err.to_string().contains("not present in the source"));
    }

    #[test]
    fn test_prefix_more_applied_than_source() {
        let set = catalog(&[1], true);
        let err = check_prefix(&set, &applied(&[1, 2])).unwrap_err();
        assert!(err.to_string().contains("[2]"));
    }

    // ── Forward plans ───────────────────────────────────────────────

    #[test]
    fn test_plan_up_limit() {
        let set = catalog(&[1, 2, 3, 4, 5], true);
        let work = plan_up(&set, &applied(&[1, 2]), 2);
        assert_eq!(versions(&work), vec![3, 4]);
    }

    #[test]
    fn test_plan_up_zero_means_all() {
        let set = catalog(&[1, 2, 3], true);
        assert_eq!(versions(&plan_up(&set, &applied(&[1]), 0)), vec![2, 3]);
    }

    #[test]
    fn test_plan_up_limit_past_pending() {
        let set = catalog(&[1, 2], true);
        assert_eq!(versions(&plan_up(&set, &[], 10)), vec![1, 2]);
        assert!(plan_up(&set, &applied(&[1, 2]), 0).is_empty());
    }

    // ── Backward plans ──────────────────────────────────────────────

    #[test]
    fn test_plan_down_descending() {
        let set = catalog(&[1, 2, 3], true);
        let work = plan_down(&set, &applied(&[1, 2, 3]), DownLimit::Count(2)).unwrap();
        assert_eq!(versions(&work), vec![3, 2]);
        assert!(work.iter().all(|m| m.statements.starts_with("DOWN")));
    }

    #[test]
    fn test_plan_down_zero_and_all() {
        let set = catalog(&[1, 2, 3], true);
        let records = applied(&[1, 2]);
        assert!(plan_down(&set, &records, DownLimit::Count(0)).unwrap().is_empty());
        let all = plan_down(&set, &records, DownLimit::All).unwrap();
        assert_eq!(versions(&all), vec![2, 1]);
    }

    #[test]
    fn test_plan_down_irreversible() {
        let set = catalog(&[1, 2], false);
        let err = plan_down(&set, &applied(&[1, 2]), DownLimit::Count(1)).unwrap_err();
        assert!(err.to_string().contains("[2]"));
        // Nothing selected means nothing to complain about.
        assert!(plan_down(&set, &applied(&[1, 2]), DownLimit::Count(0)).is_ok());
    }

    // ── Status ──────────────────────────────────────────────────────

    #[test]
    fn test_status() {
        let set = catalog(&[1, 2], true);
        let rows = status(&set, &applied(&[1]));
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_applied());
        assert!(!rows[1].is_applied());
        assert!(rows[1].reversible);
    }
}
