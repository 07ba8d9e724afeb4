use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The reserved id of the permanent default list
pub const DEFAULT_LIST_ID: &str = "default";

/// Display name of the default list
pub const DEFAULT_LIST_NAME: &str = "General";

/// Colors offered to new lists, in order of preference
pub const LIST_PALETTE: [&str; 6] = [
    "#4F46E5", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899",
];

/// A named, colored grouping of tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub name: String,
    /// Passed through unchanged
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl TaskList {
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_LIST_ID
    }
}

/// Partial update for a list. Id and creation time are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// The default list on its own, used when repairing a lists record
pub fn default_list(now: DateTime<Utc>) -> TaskList {
    TaskList {
        id: DEFAULT_LIST_ID.to_string(),
        name: DEFAULT_LIST_NAME.to_string(),
        color: LIST_PALETTE[0].to_string(),
        created_at: now,
    }
}

/// Lists written on the very first load: General, Work, Personal
pub fn seed_lists(now: DateTime<Utc>) -> Vec<TaskList> {
    vec![
        default_list(now),
        TaskList {
            id: "work".to_string(),
            name: "Work".to_string(),
            color: LIST_PALETTE[1].to_string(),
            created_at: now,
        },
        TaskList {
            id: "personal".to_string(),
            name: "Personal".to_string(),
            color: LIST_PALETTE[2].to_string(),
            created_at: now,
        },
    ]
}
