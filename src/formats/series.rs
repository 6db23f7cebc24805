// Series listing from GET /series/{id}/instances.
//
// Only two fields matter: the instance ID and IndexInSeries, which is
// the display slot. Entries arrive in whatever order the archive keeps
// them; the result is sorted by slot.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::kernel::{SliceHandle, display_order};

#[derive(Debug, Deserialize)]
struct InstanceEntry {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "IndexInSeries", default)]
    index_in_series: Option<u32>,
}

pub fn parse_series_listing(json: &str) -> Result<Vec<SliceHandle>> {
    let entries: Vec<InstanceEntry> = serde_json::from_str(json)
        .map_err(|e| Error::Transport(format!("series listing: {e}")))?;

    let mut handles = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.index_in_series {
            Some(slot) if slot > 0 => handles.push(SliceHandle::new(entry.id, slot)),
            _ => log::warn!("archive: instance {} has no IndexInSeries, skipped", entry.id),
        }
    }

    let ordered = display_order(&handles);
    if ordered.len() != handles.len() {
        log::warn!(
            "archive: {} instance(s) repeat a slot index",
            handles.len() - ordered.len()
        );
    }
    Ok(ordered)
}
