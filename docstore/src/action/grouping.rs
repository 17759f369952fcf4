use crate::action::Action;
use crate::common::FieldPath;
use indexmap::IndexMap;

/// A validated action list split into its execution phases.
///
/// Each phase keeps the relative submission order of its actions.
#[derive(Default)]
pub(crate) struct ActionGroups<'a> {
    /// Gets before the first write.
    pub pre_gets: Vec<Action<'a>>,
    /// Gets between the first and the last write; they run alongside the
    /// writes.
    pub reads: Vec<Action<'a>>,
    /// Writes outside any atomic group.
    pub writes: Vec<Action<'a>>,
    /// Writes that commit together in one transaction.
    pub atomic_writes: Vec<Action<'a>>,
    /// Gets after the last write.
    pub post_gets: Vec<Action<'a>>,
}

impl<'a> ActionGroups<'a> {
    pub fn len(&self) -> usize {
        self.pre_gets.len() + self.reads.len() + self.writes.len() + self.atomic_writes.len() + self.post_gets.len()
    }
}

/// Partitions actions into phases by their position relative to the first
/// and last write. A list without writes is all pre-gets.
pub(crate) fn group_actions(actions: Vec<Action<'_>>) -> ActionGroups<'_> {
    let first_write = actions.iter().position(|a| a.kind.is_write());
    let last_write = actions.iter().rposition(|a| a.kind.is_write());

    let mut groups = ActionGroups::default();
    for (position, action) in actions.into_iter().enumerate() {
        if action.kind.is_write() {
            if action.atomic {
                groups.atomic_writes.push(action);
            } else {
                groups.writes.push(action);
            }
            continue;
        }

        match (first_write, last_write) {
            (Some(first), _) if position < first => groups.pre_gets.push(action),
            (_, Some(last)) if position > last => groups.post_gets.push(action),
            (None, None) => groups.pre_gets.push(action),
            _ => groups.reads.push(action),
        }
    }
    groups
}

/// Groups gets by their exact field-path list, in order of first appearance.
/// Two requests for the same fields in a different order are different
/// groups.
pub(crate) fn group_by_field_paths(gets: Vec<Action<'_>>) -> IndexMap<Vec<FieldPath>, Vec<Action<'_>>> {
    let mut groups: IndexMap<Vec<FieldPath>, Vec<Action<'_>>> = IndexMap::new();
    for action in gets {
        groups
            .entry(action.field_paths.clone())
            .or_default()
            .push(action);
    }
    groups
}
