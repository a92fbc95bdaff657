//! Help/listing surface.
//!
//! Uses the same path-wide access decision as dispatch, so nothing is listed that
//! the invoker would be refused when running it.

use crate::core::access::Invoker;
use crate::core::registry::{self, Registry};
use serde::Serialize;
use std::collections::BTreeMap;

const UNTAGGED: &str = "general";
const DESCRIPTION_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub path: String,
    pub description: String,
    pub tags: Vec<String>,
    pub aliases: Vec<String>,
}

/// Every leaf the invoker may run, in registration order.
pub fn visible_commands(registry: &Registry, invoker: &Invoker) -> Vec<ListingEntry> {
    registry
        .leaf_paths()
        .into_iter()
        .filter(|path| registry.decide(path, invoker).allowed)
        .filter_map(|path| {
            let leaf = *path.last()?;
            // Tags are inherited down the path so a group's category covers its children.
            let mut tags: Vec<String> = path
                .iter()
                .flat_map(|d| d.tags.iter().map(|t| t.to_string()))
                .collect();
            tags.sort();
            tags.dedup();
            Some(ListingEntry {
                path: registry::display_path(&path),
                description: leaf.description.clone(),
                tags,
                aliases: leaf.aliases.clone(),
            })
        })
        .collect()
}

/// Group entries under their tags; untagged entries land under `general`.
pub fn by_category(entries: &[ListingEntry]) -> BTreeMap<String, Vec<&ListingEntry>> {
    let mut out: BTreeMap<String, Vec<&ListingEntry>> = BTreeMap::new();
    for entry in entries {
        if entry.tags.is_empty() {
            out.entry(UNTAGGED.to_string()).or_default().push(entry);
        }
        for tag in &entry.tags {
            out.entry(tag.clone()).or_default().push(entry);
        }
    }
    out
}

/// One-line-per-command help text.
pub fn render(entries: &[ListingEntry], prefix: &str) -> String {
    let mut lines = Vec::new();
    for (category, group) in by_category(entries) {
        lines.push(format!("[{category}]"));
        for entry in group {
            let mut line = format!("  {prefix}{}", entry.path);
            if !entry.aliases.is_empty() {
                line.push_str(&format!(" ({})", entry.aliases.join(", ")));
            }
            if !entry.description.is_empty() {
                line.push_str(" - ");
                line.push_str(&short_description(&entry.description));
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn short_description(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= DESCRIPTION_WIDTH {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(DESCRIPTION_WIDTH).collect();
    format!("{}...", cut.trim_end())
}
