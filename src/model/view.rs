use serde::{Deserialize, Serialize};

/// Which tasks a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn parse(s: &str) -> Option<StatusFilter> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Some(StatusFilter::All),
            "pending" | "open" => Some(StatusFilter::Pending),
            "completed" | "done" => Some(StatusFilter::Completed),
            _ => None,
        }
    }
}

/// Field a view is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    DueDate,
    Priority,
    #[default]
    CreatedAt,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<SortKey> {
        match s.to_ascii_lowercase().as_str() {
            "due" | "due-date" | "duedate" => Some(SortKey::DueDate),
            "priority" | "prio" => Some(SortKey::Priority),
            "created" | "created-at" | "createdat" => Some(SortKey::CreatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "ascending")]
    Asc,
    #[default]
    #[serde(alias = "descending")]
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Filter and sort parameters for a list view.
///
/// The default (all tasks, newest first) is what a freshly opened list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewOptions {
    #[serde(default)]
    pub filter: StatusFilter,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl ViewOptions {
    /// Selecting the current key again flips the direction; a new key
    /// starts out descending.
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.sort == key {
            self.direction = self.direction.reversed();
        } else {
            self.sort = key;
            self.direction = SortDirection::Desc;
        }
    }
}
