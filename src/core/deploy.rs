//! Subcommand deployment translation.
//!
//! Turns the descriptor tree into the flat list of commands a structured platform
//! registers. `Split` children become their own commands named `parent-child`;
//! a `Merge` parent stays one command with a `subcommand` option whose choices are
//! the child paths. The structured adapter in `invocation` reads this same export
//! back, so a child reachable one way is reachable the other way under the same name.

use crate::core::descriptor::{CommandDescriptor, Deployment};
use crate::core::option::OptionSpec;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const SUBCOMMAND_OPTION: &str = "subcommand";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubcommandOption {
    pub name: String,
    pub required: bool,
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedCommand {
    /// Flat, platform-facing name (`calc-add`).
    pub name: String,
    /// Free-text form of the same command (`calc add`).
    pub display: String,
    pub description: String,
    #[serde(skip)]
    pub path: Vec<String>,
    pub options: Vec<OptionSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcommand: Option<SubcommandOption>,
}

impl ExportedCommand {
    pub fn is_merged(&self) -> bool {
        self.subcommand.is_some()
    }
}

pub fn export(roots: &[CommandDescriptor]) -> Vec<ExportedCommand> {
    let mut out = Vec::new();
    for root in roots {
        export_node(root, vec![root.name.clone()], &mut out);
    }
    out
}

fn export_node(desc: &CommandDescriptor, path: Vec<String>, out: &mut Vec<ExportedCommand>) {
    let Some(children) = &desc.children else {
        out.push(exported(desc, path, desc.options.clone(), None));
        return;
    };

    match children.deployment {
        Deployment::Merge => {
            let subcommand = SubcommandOption {
                name: SUBCOMMAND_OPTION.to_string(),
                required: desc.default_child.is_none(),
                choices: merge_choices(desc),
            };
            out.push(exported(desc, path, merged_options(desc), Some(subcommand)));
        }
        Deployment::Split => {
            if let Some(default) = desc.default_child.as_ref().and_then(|d| desc.child_by_name(d)) {
                if default.is_leaf() {
                    out.push(exported(desc, path.clone(), default.options.clone(), None));
                }
            }
            for child in &children.list {
                let mut child_path = path.clone();
                child_path.push(child.name.clone());
                export_node(child, child_path, out);
            }
        }
    }
}

fn exported(
    desc: &CommandDescriptor,
    path: Vec<String>,
    options: Vec<OptionSpec>,
    subcommand: Option<SubcommandOption>,
) -> ExportedCommand {
    ExportedCommand {
        name: path.join("-"),
        display: path.join(" "),
        description: desc.description.clone(),
        path,
        options,
        subcommand,
    }
}

/// Every subcommand path selectable under a merged descriptor, relative to it.
///
/// A nested group with a default child is itself a valid choice.
pub fn merge_choices(desc: &CommandDescriptor) -> Vec<String> {
    let mut out = Vec::new();
    collect_choices(desc, "", &mut out);
    out
}

fn collect_choices(desc: &CommandDescriptor, prefix: &str, out: &mut Vec<String>) {
    let Some(children) = &desc.children else {
        return;
    };
    for child in &children.list {
        let path = if prefix.is_empty() {
            child.name.clone()
        } else {
            format!("{prefix} {}", child.name)
        };
        if child.is_leaf() {
            out.push(path);
        } else {
            if child.default_child.is_some() {
                out.push(path.clone());
            }
            collect_choices(child, &path, out);
        }
    }
}

/// Union of leaf options under a merged descriptor, all optional on the platform
/// side; the resolver re-validates against the selected leaf.
fn merged_options(desc: &CommandDescriptor) -> Vec<OptionSpec> {
    let mut out: Vec<OptionSpec> = Vec::new();
    collect_options(desc, &mut out);
    out
}

fn collect_options(desc: &CommandDescriptor, out: &mut Vec<OptionSpec>) {
    match &desc.children {
        None => {
            for opt in &desc.options {
                match out.iter().find(|o| o.name == opt.name) {
                    Some(existing) if existing.kind != opt.kind => {
                        tracing::debug!(
                            option = %opt.name,
                            "merged option kind conflict, keeping first declaration"
                        );
                    }
                    Some(_) => {}
                    None => {
                        let mut opt = opt.clone();
                        opt.required = false;
                        out.push(opt);
                    }
                }
            }
        }
        Some(children) => {
            for child in &children.list {
                collect_options(child, out);
            }
        }
    }
}

/// Stable hash of the export, so adapters can skip re-registering an unchanged schema.
pub fn fingerprint(exports: &[ExportedCommand]) -> String {
    let bytes = serde_json::to_vec(exports).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

pub fn render_text(exports: &[ExportedCommand]) -> String {
    let mut lines = Vec::new();
    for cmd in exports {
        let mut line = format!("/{}", cmd.name);
        if let Some(sub) = &cmd.subcommand {
            let marker = if sub.required { "" } else { "?" };
            line.push_str(&format!(" {}{}=<{}>", sub.name, marker, sub.choices.join("|")));
        }
        for opt in &cmd.options {
            let marker = if opt.required { "" } else { "?" };
            line.push_str(&format!(" {}{}:{:?}", opt.name, marker, opt.kind));
        }
        lines.push(line);
    }
    lines.join("\n")
}
