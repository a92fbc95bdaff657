//! Command registry.
//!
//! Built once through [`RegistryBuilder`] and frozen into an immutable [`Registry`]
//! that is shared by reference (usually `Arc<Registry>`) with every dispatch. Name
//! collisions are configuration errors caught here; nothing is silently shadowed.

use crate::core::access::{self, AccessDecision, AccessRule, Invoker};
use crate::core::config::Config;
use crate::core::deploy::{self, ExportedCommand};
use crate::core::descriptor::CommandDescriptor;
use crate::core::envelope::Tag;
use crate::core::error::SwitchboardError;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

const ROOT_SCOPE: &str = "<root>";
const STRUCTURED_SCOPE: &str = "<structured>";

/// What a top-level token refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootEntry {
    /// Index path from the roots down to the descriptor.
    Command(Vec<usize>),
    /// User-defined shortcut, expanded textually once.
    Shortcut(String),
}

/// Where a structured (platform) command name lands in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRoute {
    pub path: Vec<String>,
    pub merged: bool,
    /// Exported `subcommand` choices; empty unless merged.
    pub choices: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    roots: Vec<CommandDescriptor>,
    shortcuts: Vec<(String, String)>,
    overrides: Vec<(String, AccessRule)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, desc: CommandDescriptor) -> Result<(), SwitchboardError> {
        check_descriptor(&desc, &desc.name)?;

        let mut taken = self.taken_root_names();
        for name in root_scope_names(&desc) {
            if !taken.insert(name.to_string()) {
                return Err(SwitchboardError::DuplicateName {
                    scope: ROOT_SCOPE.to_string(),
                    name: name.to_string(),
                });
            }
        }

        debug!(command = %desc.name, "registered command");
        self.roots.push(desc);
        Ok(())
    }

    /// Register a shortcut such as `greet` -> `say hello`.
    pub fn shortcut(
        &mut self,
        name: impl Into<String>,
        expansion: impl Into<String>,
    ) -> Result<(), SwitchboardError> {
        let name = name.into();
        let expansion = expansion.into();
        if !is_token(&name) {
            return Err(SwitchboardError::ValidationError(format!(
                "shortcut name '{name}' must be a single non-empty token"
            )));
        }
        if expansion.trim().is_empty() {
            return Err(SwitchboardError::ValidationError(format!(
                "shortcut '{name}' has an empty expansion"
            )));
        }
        if self.taken_root_names().contains(&name) {
            return Err(SwitchboardError::DuplicateName {
                scope: ROOT_SCOPE.to_string(),
                name,
            });
        }
        debug!(shortcut = %name, expansion = %expansion, "registered shortcut");
        self.shortcuts.push((name, expansion.trim().to_string()));
        Ok(())
    }

    /// Override the access policy of the descriptor at `path` (space-separated names).
    pub fn restrict(&mut self, path: impl Into<String>, rule: AccessRule) {
        self.overrides.push((path.into(), rule));
    }

    pub fn apply_config(&mut self, config: &Config) -> Result<(), SwitchboardError> {
        for (name, expansion) in &config.shortcuts {
            self.shortcut(name.clone(), expansion.clone())?;
        }
        for (path, rule) in &config.access {
            self.restrict(path.clone(), rule.clone());
        }
        Ok(())
    }

    pub fn build(mut self) -> Result<Registry, SwitchboardError> {
        for (path, rule) in std::mem::take(&mut self.overrides) {
            let target = find_mut(&mut self.roots, &path)
                .ok_or_else(|| SwitchboardError::NotFound(format!("access override for '{path}'")))?;
            debug!(command = %path, "access policy overridden by config");
            target.restrict(rule);
        }

        for root in &mut self.roots {
            let path = root.name.clone();
            fold_legacy_piping(root, &path);
        }

        let mut root_index = FxHashMap::default();
        for (i, root) in self.roots.iter().enumerate() {
            for name in root.names() {
                root_index.insert(name.to_string(), RootEntry::Command(vec![i]));
            }
            index_root_aliases(root, vec![i], &mut root_index);
        }
        for (name, expansion) in &self.shortcuts {
            root_index.insert(name.clone(), RootEntry::Shortcut(expansion.clone()));
        }

        let exports = deploy::export(&self.roots);
        let mut structured = FxHashMap::default();
        for cmd in &exports {
            let route = StructuredRoute {
                path: cmd.path.clone(),
                merged: cmd.is_merged(),
                choices: cmd
                    .subcommand
                    .as_ref()
                    .map(|sub| sub.choices.clone())
                    .unwrap_or_default(),
            };
            if structured.insert(cmd.name.clone(), route).is_some() {
                return Err(SwitchboardError::DuplicateName {
                    scope: STRUCTURED_SCOPE.to_string(),
                    name: cmd.name.clone(),
                });
            }
        }

        debug!(
            commands = self.roots.len(),
            exported = exports.len(),
            "registry built"
        );
        Ok(Registry {
            roots: self.roots,
            root_index,
            structured,
            exports,
        })
    }

    fn taken_root_names(&self) -> FxHashSet<String> {
        let mut names: FxHashSet<String> = self
            .roots
            .iter()
            .flat_map(|r| root_scope_names(r))
            .map(str::to_string)
            .collect();
        names.extend(self.shortcuts.iter().map(|(n, _)| n.clone()));
        names
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_whitespace)
}

/// Names a descriptor claims at top level: its own names plus nested root aliases.
fn root_scope_names(desc: &CommandDescriptor) -> Vec<&str> {
    let mut out: Vec<&str> = desc.names().collect();
    collect_root_aliases(desc, &mut out);
    out
}

fn collect_root_aliases<'a>(desc: &'a CommandDescriptor, out: &mut Vec<&'a str>) {
    out.extend(desc.root_aliases.iter().map(String::as_str));
    if let Some(children) = &desc.children {
        for child in &children.list {
            collect_root_aliases(child, out);
        }
    }
}

fn check_descriptor(desc: &CommandDescriptor, path: &str) -> Result<(), SwitchboardError> {
    let invalid = |reason: String| SwitchboardError::InvalidDescriptor {
        command: path.to_string(),
        reason,
    };

    for name in desc.names().chain(desc.root_aliases.iter().map(String::as_str)) {
        if !is_token(name) {
            return Err(invalid(format!("'{name}' is not a single token")));
        }
    }

    let Some(children) = &desc.children else {
        if desc.handler.is_none() {
            return Err(invalid("leaf command has no handler".into()));
        }
        for arg in desc.template.arg_names() {
            if !desc.options.iter().any(|o| o.name == arg) {
                return Err(invalid(format!("template fills undeclared option '{arg}'")));
            }
        }
        return Ok(());
    };

    if !desc.options.is_empty() {
        return Err(invalid("a command with subcommands cannot declare options".into()));
    }
    if desc.handler.is_some() {
        return Err(invalid(
            "a command with subcommands cannot have a handler; use a default child".into(),
        ));
    }
    if children.list.is_empty() {
        return Err(invalid("subcommand list is empty".into()));
    }
    if let Some(default) = &desc.default_child {
        if desc.child_by_name(default).is_none() {
            return Err(invalid(format!("default child '{default}' does not exist")));
        }
    }

    let mut seen = FxHashSet::default();
    for child in &children.list {
        for name in child.names() {
            if !seen.insert(name) {
                return Err(SwitchboardError::DuplicateName {
                    scope: path.to_string(),
                    name: name.to_string(),
                });
            }
        }
        check_descriptor(child, &format!("{path} {}", child.name))?;
    }
    Ok(())
}

fn find_mut<'a>(
    roots: &'a mut [CommandDescriptor],
    path: &str,
) -> Option<&'a mut CommandDescriptor> {
    let mut tokens = path.split_whitespace();
    let first = tokens.next()?;
    let mut current = roots.iter_mut().find(|r| r.name == first)?;
    for token in tokens {
        current = current
            .children
            .as_mut()?
            .list
            .iter_mut()
            .find(|c| c.name == token)?;
    }
    Some(current)
}

fn fold_legacy_piping(desc: &mut CommandDescriptor, path: &str) {
    for target in std::mem::take(&mut desc.pipable_to) {
        desc.pipe_produces.insert(Tag::pipe_target(&target));
    }
    desc.pipe_accepts.insert(Tag::pipe_target(path));
    if let Some(children) = &mut desc.children {
        for child in &mut children.list {
            let child_path = format!("{path} {}", child.name);
            fold_legacy_piping(child, &child_path);
        }
    }
}

fn index_root_aliases(
    desc: &CommandDescriptor,
    index_path: Vec<usize>,
    out: &mut FxHashMap<String, RootEntry>,
) {
    for alias in &desc.root_aliases {
        out.insert(alias.clone(), RootEntry::Command(index_path.clone()));
    }
    if let Some(children) = &desc.children {
        for (i, child) in children.list.iter().enumerate() {
            let mut child_path = index_path.clone();
            child_path.push(i);
            index_root_aliases(child, child_path, out);
        }
    }
}

/// Immutable, process-wide command registry.
#[derive(Debug)]
pub struct Registry {
    roots: Vec<CommandDescriptor>,
    root_index: FxHashMap<String, RootEntry>,
    structured: FxHashMap<String, StructuredRoute>,
    exports: Vec<ExportedCommand>,
}

impl Registry {
    pub fn roots(&self) -> &[CommandDescriptor] {
        &self.roots
    }

    pub fn lookup_root(&self, token: &str) -> Option<&RootEntry> {
        self.root_index.get(token)
    }

    /// Descriptors along an index path, root first.
    pub fn descriptor_path(&self, index_path: &[usize]) -> Vec<&CommandDescriptor> {
        let mut out = Vec::with_capacity(index_path.len());
        let mut level: &[CommandDescriptor] = &self.roots;
        for &i in index_path {
            let Some(desc) = level.get(i) else {
                break;
            };
            out.push(desc);
            level = desc.children.as_ref().map(|c| c.list.as_slice()).unwrap_or(&[]);
        }
        out
    }

    /// Look up a descriptor path by canonical names, e.g. `"todo add"`.
    pub fn find(&self, path: &str) -> Option<Vec<&CommandDescriptor>> {
        let mut tokens = path.split_whitespace();
        let first = tokens.next()?;
        let mut current = self.roots.iter().find(|r| r.name == first)?;
        let mut out = vec![current];
        for token in tokens {
            current = current.child_by_name(token)?;
            out.push(current);
        }
        Some(out)
    }

    pub fn structured_route(&self, name: &str) -> Option<&StructuredRoute> {
        self.structured.get(name)
    }

    pub fn exports(&self) -> &[ExportedCommand] {
        &self.exports
    }

    /// Every path ending in a leaf, in registration order.
    pub fn leaf_paths(&self) -> Vec<Vec<&CommandDescriptor>> {
        let mut out = Vec::new();
        for root in &self.roots {
            collect_leaves(root, vec![root], &mut out);
        }
        out
    }

    /// Path-wide access decision. The dispatcher and the listing both call this.
    pub fn decide(&self, path: &[&CommandDescriptor], invoker: &Invoker) -> AccessDecision {
        access::evaluate_path(path.iter().map(|d| &d.access), invoker)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn collect_leaves<'a>(
    desc: &'a CommandDescriptor,
    path: Vec<&'a CommandDescriptor>,
    out: &mut Vec<Vec<&'a CommandDescriptor>>,
) {
    match &desc.children {
        None => out.push(path),
        Some(children) => {
            for child in &children.list {
                let mut child_path = path.clone();
                child_path.push(child);
                collect_leaves(child, child_path, out);
            }
        }
    }
}

/// Space-separated canonical path, e.g. `case upper`.
pub fn display_path(path: &[&CommandDescriptor]) -> String {
    path.iter()
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
