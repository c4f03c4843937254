//! Pure arrangement planning over a locked, ordered member list.
//!
//! Every mutation takes the entries returned by `lock_ordered_ids`, computes the new order
//! and emits only the rows whose stored position differs from their new rank. A swap writes
//! two rows, moving an endpoint writes the rows in the gap, and nothing else is touched.

use std::collections::HashMap;

use crate::ids::{ItemId, ListEntry, Position, Reposition};

/// Members of the scope whose stored position lies in `from..=to` move by `delta`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Shift {
    pub from: Position,
    pub to: Position,
    pub delta: i64,
    /// Members inside the range when the plan was made.
    pub rows: u64,
}

/// Outcome of a planned mutation.
///
/// On a dense list the writes reduce to the subject's own row plus one `shift` over the
/// range between its old and new rank, so the statement size does not depend on the gap.
/// Lists with stale positions fall back to explicit per-row `writes`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Plan {
    /// Rows to update, ordered by their new position (`None` last).
    pub writes: Vec<Reposition>,
    pub shift: Option<Shift>,
    /// Final position of the subject item, `None` when it left the list.
    pub position: Option<Position>,
}

impl Plan {
    /// Explicit assignments only.
    pub fn assign(writes: Vec<Reposition>) -> Self {
        Self {
            writes,
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.writes.is_empty() && self.shift.is_none()
    }

    /// Rows the store is expected to update.
    pub fn rows(&self) -> u64 {
        self.writes.len() as u64 + self.shift.map_or(0, |s| s.rows)
    }
}

/// Index of `item` in `entries`, if it is a member.
pub fn rank_of(entries: &[ListEntry], item: ItemId) -> Option<usize> {
    entries.iter().position(|e| e.id == item)
}

/// Clamp a requested position to `1..=len + 1`.
pub fn clamp_position(target: i64, len: usize) -> Position {
    let max = len as i64 + 1;
    target.clamp(1, max)
}

fn diff(before: &[ListEntry], after: &[Option<ItemId>], subject: Option<ItemId>) -> Plan {
    let stored: HashMap<ItemId, Position> = before.iter().map(|e| (e.id, e.position)).collect();
    let mut writes = Vec::new();
    let mut subject_stays = false;
    for (idx, slot) in after.iter().enumerate() {
        let Some(id) = slot else {
            continue;
        };
        subject_stays |= Some(*id) == subject;
        let rank = idx as Position + 1;
        if stored.get(id) != Some(&rank) {
            writes.push(Reposition {
                id: *id,
                position: Some(rank),
            });
        }
    }
    if let Some(id) = subject {
        if !subject_stays && stored.contains_key(&id) {
            writes.push(Reposition { id, position: None });
        }
    }

    let shift = as_shift(before, &stored, &writes, subject);
    if shift.is_some() {
        writes.retain(|w| Some(w.id) == subject);
    }
    Plan {
        writes,
        shift,
        position: None,
    }
}

/// Express every non-subject write as one range shift, when the range holds exactly the
/// rows that move and they all move by the same amount.
fn as_shift(
    before: &[ListEntry],
    stored: &HashMap<ItemId, Position>,
    writes: &[Reposition],
    subject: Option<ItemId>,
) -> Option<Shift> {
    let mut delta = None;
    let (mut from, mut to) = (Position::MAX, Position::MIN);
    let mut rows = 0u64;
    for write in writes.iter().filter(|w| Some(w.id) != subject) {
        let old = *stored.get(&write.id)?;
        let d = write.position? - old;
        if *delta.get_or_insert(d) != d {
            return None;
        }
        from = from.min(old);
        to = to.max(old);
        rows += 1;
    }
    let delta = delta?;
    let in_range = before
        .iter()
        .filter(|e| (from..=to).contains(&e.position))
        .count() as u64;
    (in_range == rows).then_some(Shift {
        from,
        to,
        delta,
        rows,
    })
}

/// Place `item` at `target` (clamped), removing it from its current rank first.
///
/// `item` is `None` for a row that does not exist yet: the others are shifted to open the
/// slot and the caller assigns the returned position in memory.
pub fn insert_at(entries: &[ListEntry], item: Option<ItemId>, target: i64) -> Plan {
    let mut order: Vec<Option<ItemId>> = entries
        .iter()
        .map(|e| Some(e.id))
        .filter(|id| *id != item)
        .collect();
    let position = clamp_position(target, order.len());
    order.insert(position as usize - 1, item);

    Plan {
        position: Some(position),
        ..diff(entries, &order, item)
    }
}

/// Move `item` to the end of the list (joining it if it was not a member).
pub fn append(entries: &[ListEntry], item: Option<ItemId>) -> Plan {
    insert_at(entries, item, i64::MAX)
}

/// Take `item` out of the list and close the gap.
pub fn remove(entries: &[ListEntry], item: ItemId) -> Plan {
    let order: Vec<Option<ItemId>> = entries
        .iter()
        .map(|e| Some(e.id))
        .filter(|id| *id != Some(item))
        .collect();
    diff(entries, &order, Some(item))
}

/// Close the gap below `item` while leaving its own row untouched.
pub fn close_gap(entries: &[ListEntry], item: ItemId) -> Plan {
    let current = entries.iter().find(|e| e.id == item).map(|e| e.position);
    let mut plan = remove(entries, item);
    plan.writes.retain(|w| w.id != item);
    plan.position = current;
    plan
}
