use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::view::{SortDirection, SortKey, StatusFilter, ViewOptions};

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the task and list records.
    /// Absent = `$XDG_DATA_HOME/ticklist`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Default parameters for `tl ls`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub filter: StatusFilter,
}

impl ViewConfig {
    pub fn options(&self) -> ViewOptions {
        ViewOptions {
            filter: self.filter,
            sort: self.sort,
            direction: self.direction,
        }
    }
}
