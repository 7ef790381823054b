//! Deterministic story selection.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::types::Story;

/// How the "least effort" story is chosen from the tracker result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// Take the first issue in the order the tracker returned.
    ///
    /// The query is not ordered by effort, so this only approximates the
    /// least-effort story. Kept as the default to match existing runs.
    #[default]
    First,
    /// Sort by effort points ascending (stable) and take the first.
    /// Unestimated stories sort after every estimated one.
    LeastEffort,
}

impl SelectionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionRule::First => "first",
            SelectionRule::LeastEffort => "least_effort",
        }
    }
}

/// Pick one story according to `rule`. Returns `None` for an empty slice.
pub fn select_story(stories: &[Story], rule: SelectionRule) -> Option<&Story> {
    match rule {
        SelectionRule::First => stories.first(),
        SelectionRule::LeastEffort => stories
            .iter()
            .enumerate()
            .min_by(|(ia, a), (ib, b)| compare_effort(a, b).then(ia.cmp(ib)))
            .map(|(_, story)| story),
    }
}

fn compare_effort(a: &Story, b: &Story) -> Ordering {
    match (a.effort_points, b.effort_points) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
