use std::collections::HashMap;

/// Kind of row change in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Delete,
    Move,
    Update,
}

/// One row change with list-diff position semantics
///
/// Delete and move-from positions are relative to the pre-change ordering;
/// insert and move-to positions are relative to the post-change ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub id: String,
    pub op: ChangeOp,
    pub position: usize,
    pub new_position: Option<usize>,
}

/// Diff two ordered materializations of the same scope
///
/// Keys are (row id, revision). Emission order: deletes by ascending old
/// position, inserts by ascending new position, then moves, then updates.
/// A surviving row moved when its rank among the surviving rows changed;
/// a row that moved and also changed revision emits Move followed by Update.
pub fn diff_ordered(old: &[(String, u64)], new: &[(String, u64)]) -> Vec<RowChange> {
    let old_index: HashMap<&str, usize> = old
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id.as_str(), i))
        .collect();
    let new_index: HashMap<&str, usize> = new
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id.as_str(), i))
        .collect();

    let mut changes = Vec::new();

    for (position, (id, _)) in old.iter().enumerate() {
        if !new_index.contains_key(id.as_str()) {
            changes.push(RowChange {
                id: id.clone(),
                op: ChangeOp::Delete,
                position,
                new_position: None,
            });
        }
    }

    for (position, (id, _)) in new.iter().enumerate() {
        if !old_index.contains_key(id.as_str()) {
            changes.push(RowChange {
                id: id.clone(),
                op: ChangeOp::Insert,
                position,
                new_position: None,
            });
        }
    }

    // Ranks among surviving rows decide what actually moved
    let old_rank: HashMap<&str, usize> = old
        .iter()
        .filter(|(id, _)| new_index.contains_key(id.as_str()))
        .enumerate()
        .map(|(rank, (id, _))| (id.as_str(), rank))
        .collect();
    let new_rank: HashMap<&str, usize> = new
        .iter()
        .filter(|(id, _)| old_index.contains_key(id.as_str()))
        .enumerate()
        .map(|(rank, (id, _))| (id.as_str(), rank))
        .collect();

    for (id, _) in new.iter() {
        if let (Some(old_r), Some(new_r)) = (
            old_rank.get(id.as_str()),
            new_rank.get(id.as_str()),
        ) {
            if old_r != new_r {
                changes.push(RowChange {
                    id: id.clone(),
                    op: ChangeOp::Move,
                    position: old_index[id.as_str()],
                    new_position: Some(new_index[id.as_str()]),
                });
            }
        }
    }

    for (id, revision) in new.iter() {
        if let Some(old_pos) = old_index.get(id.as_str()) {
            if old[*old_pos].1 != *revision {
                changes.push(RowChange {
                    id: id.clone(),
                    op: ChangeOp::Update,
                    position: new_index[id.as_str()],
                    new_position: None,
                });
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(pairs: &[(&str, u64)]) -> Vec<(String, u64)> {
        pairs.iter().map(|(id, r)| (id.to_string(), *r)).collect()
    }

    #[test]
    fn two_inserts_into_an_empty_scope() {
        let old = keys(&[]);
        let new = keys(&[("a", 0), ("b", 0)]);

        let changes = diff_ordered(&old, &new);
        assert_eq!(
            changes,
            vec![
                RowChange {
                    id: "a".to_string(),
                    op: ChangeOp::Insert,
                    position: 0,
                    new_position: None,
                },
                RowChange {
                    id: "b".to_string(),
                    op: ChangeOp::Insert,
                    position: 1,
                    new_position: None,
                },
            ]
        );
    }

    #[test]
    fn delete_reports_pre_change_position() {
        let old = keys(&[("a", 0), ("b", 0), ("c", 0)]);
        let new = keys(&[("a", 0), ("c", 0)]);

        let changes = diff_ordered(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].op, ChangeOp::Delete);
        assert_eq!(changes[0].id, "b");
        assert_eq!(changes[0].position, 1);
    }

    #[test]
    fn insert_in_the_middle_reports_post_change_position() {
        let old = keys(&[("a", 0), ("c", 0)]);
        let new = keys(&[("a", 0), ("b", 0), ("c", 0)]);

        let changes = diff_ordered(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].op, ChangeOp::Insert);
        assert_eq!(changes[0].id, "b");
        assert_eq!(changes[0].position, 1);
    }

    #[test]
    fn swap_emits_two_moves() {
        let old = keys(&[("a", 0), ("b", 0)]);
        let new = keys(&[("b", 0), ("a", 0)]);

        let changes = diff_ordered(&old, &new);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.op == ChangeOp::Move));

        let b = changes.iter().find(|c| c.id == "b").unwrap();
        assert_eq!(b.position, 1);
        assert_eq!(b.new_position, Some(0));
    }

    #[test]
    fn revision_bump_in_place_is_an_update() {
        let old = keys(&[("a", 0), ("b", 0)]);
        let new = keys(&[("a", 0), ("b", 3)]);

        let changes = diff_ordered(&old, &new);
        assert_eq!(
            changes,
            vec![RowChange {
                id: "b".to_string(),
                op: ChangeOp::Update,
                position: 1,
                new_position: None,
            }]
        );
    }

    #[test]
    fn insert_does_not_move_displaced_survivors() {
        // "b" shifts down because "a" was inserted above it, but its rank
        // among surviving rows is unchanged, so only the insert is reported
        let old = keys(&[("b", 0)]);
        let new = keys(&[("a", 0), ("b", 0)]);

        let changes = diff_ordered(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].op, ChangeOp::Insert);
        assert_eq!(changes[0].id, "a");
        assert_eq!(changes[0].position, 0);
    }

    #[test]
    fn moved_and_updated_row_emits_move_then_update() {
        let old = keys(&[("a", 0), ("b", 0), ("c", 0)]);
        let new = keys(&[("c", 1), ("a", 0), ("b", 0)]);

        let changes = diff_ordered(&old, &new);
        let ops: Vec<(&str, ChangeOp)> = changes
            .iter()
            .map(|c| (c.id.as_str(), c.op))
            .collect();

        let move_pos = ops
            .iter()
            .position(|(id, op)| *id == "c" && *op == ChangeOp::Move)
            .unwrap();
        let update_pos = ops
            .iter()
            .position(|(id, op)| *id == "c" && *op == ChangeOp::Update)
            .unwrap();
        assert!(move_pos < update_pos);
    }
}
