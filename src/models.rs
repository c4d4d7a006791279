use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl EntryInfo {
    /// Name as shown in listings, directories carry a trailing slash.
    pub fn display_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderListing {
    pub path: String,
    pub entries: Vec<EntryInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub format: Option<String>,
}

impl ListingQuery {
    pub fn wants_json(&self) -> bool {
        matches!(self.format.as_deref(), Some("json"))
    }
}
