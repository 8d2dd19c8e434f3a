use crate::domain::model::{DaySlots, NotifiedSet, SlotKey, Snapshot};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// 新出現的時段，依快照的日期順序分組
    pub new_slots: Vec<DaySlots>,
    /// 通知成功後才寫入 NotifiedSet
    pub keys_to_mark: BTreeSet<SlotKey>,
    /// 已通知過、這次掃描的日期裡卻沒看到的時段（只記錄，不會移除）
    pub no_longer_listed: BTreeSet<SlotKey>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.new_slots.is_empty()
    }

    pub fn new_count(&self) -> usize {
        self.new_slots.iter().map(|day| day.slots.len()).sum()
    }
}

/// 比對這輪快照與已通知集合。不會修改 `notified`。
pub fn diff(current: &Snapshot, notified: &NotifiedSet) -> Diff {
    let mut result = Diff::default();

    for day in current.days() {
        let fresh: Vec<_> = day
            .slots
            .iter()
            .filter(|slot| !notified.contains(&slot.key()))
            .cloned()
            .collect();

        if fresh.is_empty() {
            continue;
        }

        result.keys_to_mark.extend(fresh.iter().map(|slot| slot.key()));
        result.new_slots.push(DaySlots {
            date: day.date,
            slots: fresh,
        });
    }

    // 空快照多半是抓取失敗，不能據此判斷時段消失
    if current.is_empty() {
        return result;
    }

    let seen: BTreeSet<SlotKey> = current.slots().map(|slot| slot.key()).collect();
    result.no_longer_listed = notified
        .keys()
        .filter(|key| current.contains_date(key.date) && !seen.contains(*key))
        .cloned()
        .collect();

    result
}
