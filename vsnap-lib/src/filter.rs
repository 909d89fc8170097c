use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use vsnap_common::{Result, SnapshotRecord, VsnapError};

pub const DEFAULT_AGE_DAYS: u32 = 30;

/// Snapshots strictly older than this are cleanup candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeThreshold {
    days: u32,
}

impl AgeThreshold {
    pub fn days(days: u32) -> Result<Self> {
        if days == 0 {
            return Err(VsnapError::Config(
                "snapshot age must be a positive number of days".to_string(),
            ));
        }
        Ok(Self { days })
    }

    pub fn as_days(&self) -> u32 {
        self.days
    }

    pub fn as_duration(&self) -> Duration {
        Duration::days(i64::from(self.days))
    }

    pub fn exceeded_by(&self, snapshot: &SnapshotRecord, now: DateTime<Utc>) -> bool {
        snapshot.age(now) > self.as_duration()
    }
}

impl Default for AgeThreshold {
    fn default() -> Self {
        Self {
            days: DEFAULT_AGE_DAYS,
        }
    }
}

/// Records older than `threshold`, in input order, each snapshot at most once.
pub fn select_candidates(
    records: &[SnapshotRecord],
    threshold: AgeThreshold,
    now: DateTime<Utc>,
) -> Vec<SnapshotRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| threshold.exceeded_by(record, now))
        .filter(|record| seen.insert((record.endpoint().index, record.id.clone())))
        .cloned()
        .collect()
}

/// Order in which candidates are removed: per endpoint and VM, deepest snapshots first.
pub fn deletion_order(candidates: &[SnapshotRecord]) -> Vec<&SnapshotRecord> {
    let mut ordered: Vec<&SnapshotRecord> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        a.endpoint()
            .index
            .cmp(&b.endpoint().index)
            .then_with(|| a.vm.id.cmp(&b.vm.id))
            .then_with(|| b.depth.cmp(&a.depth))
    });
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vsnap_common::{Endpoint, VmRecord};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn snap(id: &str, vm: &str, age: Duration, depth: usize) -> SnapshotRecord {
        SnapshotRecord {
            id: id.to_string(),
            name: format!("name-{id}"),
            description: String::new(),
            created_at: now() - age,
            depth,
            vm: VmRecord {
                id: vm.to_string(),
                name: vm.to_string(),
                endpoint: Endpoint {
                    index: 1,
                    host: "vc1".to_string(),
                },
            },
        }
    }

    #[test]
    fn test_only_older_than_threshold_selected() {
        let records = vec![
            snap("s10", "vm-1", Duration::days(10), 0),
            snap("s45", "vm-1", Duration::days(45), 1),
        ];
        let candidates = select_candidates(&records, AgeThreshold::default(), now());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "s45");
    }

    #[test]
    fn test_exact_threshold_is_kept() {
        let threshold = AgeThreshold::days(30).unwrap();
        let exact = snap("s", "vm-1", Duration::days(30), 0);
        let just_over = snap("t", "vm-1", Duration::days(30) + Duration::seconds(1), 0);
        assert!(!threshold.exceeded_by(&exact, now()));
        assert!(threshold.exceeded_by(&just_over, now()));
    }

    #[test]
    fn test_duplicates_appear_once() {
        let s = snap("s1", "vm-1", Duration::days(90), 0);
        let candidates = select_candidates(&[s.clone(), s], AgeThreshold::default(), now());
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_zero_days_rejected() {
        assert!(AgeThreshold::days(0).is_err());
        assert_eq!(AgeThreshold::days(7).unwrap().as_days(), 7);
    }

    #[test]
    fn test_deletion_order_children_first() {
        let records = vec![
            snap("root", "vm-1", Duration::days(90), 0),
            snap("child", "vm-1", Duration::days(80), 1),
            snap("other", "vm-2", Duration::days(70), 0),
            snap("grandchild", "vm-1", Duration::days(60), 2),
        ];
        let order: Vec<_> = deletion_order(&records).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["grandchild", "child", "root", "other"]);
    }
}
