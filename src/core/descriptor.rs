//! Command descriptors: the static, declarative definition of a command and its
//! subcommand tree.

use crate::core::access::{AccessPolicy, AccessRule};
use crate::core::envelope::Tag;
use crate::core::extract::ArgTemplate;
use crate::core::handler::CommandHandler;
use crate::core::option::OptionSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// How a subcommand tree is exposed on the structured surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    /// One registered command; the child is picked by a `subcommand` option.
    Merge,
    /// Every child is registered as its own command (`parent-child`).
    Split,
}

#[derive(Debug, Clone)]
pub struct Children {
    pub deployment: Deployment,
    pub list: Vec<CommandDescriptor>,
}

#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
    /// Aliases addressable from the top level even when this descriptor is nested.
    pub root_aliases: Vec<String>,
    pub tags: BTreeSet<Tag>,
    pub options: Vec<OptionSpec>,
    pub access: AccessPolicy,
    pub children: Option<Children>,
    pub default_child: Option<String>,
    pub pipe_accepts: BTreeSet<Tag>,
    pub pipe_produces: BTreeSet<Tag>,
    /// Legacy downstream command names; folded into `pipe_produces` at registration.
    pub pipable_to: Vec<String>,
    pub template: ArgTemplate,
    pub handler: Option<Arc<dyn CommandHandler>>,
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("root_aliases", &self.root_aliases)
            .field("tags", &self.tags)
            .field("options", &self.options)
            .field("access", &self.access)
            .field("children", &self.children)
            .field("default_child", &self.default_child)
            .field("pipe_accepts", &self.pipe_accepts)
            .field("pipe_produces", &self.pipe_produces)
            .field("template", &self.template)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            aliases: Vec::new(),
            root_aliases: Vec::new(),
            tags: BTreeSet::new(),
            options: Vec::new(),
            access: AccessPolicy::Public,
            children: None,
            default_child: None,
            pipe_accepts: BTreeSet::new(),
            pipe_produces: BTreeSet::new(),
            pipable_to: Vec::new(),
            template: ArgTemplate::None,
            handler: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn root_alias(mut self, alias: impl Into<String>) -> Self {
        self.root_aliases.push(alias.into());
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn template(mut self, template: ArgTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn accepts(mut self, tag: Tag) -> Self {
        self.pipe_accepts.insert(tag);
        self
    }

    pub fn produces(mut self, tag: Tag) -> Self {
        self.pipe_produces.insert(tag);
        self
    }

    pub fn pipable_to(mut self, command: impl Into<String>) -> Self {
        self.pipable_to.push(command.into());
        self
    }

    pub fn handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn merge(self, children: Vec<CommandDescriptor>) -> Self {
        self.with_children(Deployment::Merge, children)
    }

    pub fn split(self, children: Vec<CommandDescriptor>) -> Self {
        self.with_children(Deployment::Split, children)
    }

    pub fn with_children(mut self, deployment: Deployment, list: Vec<CommandDescriptor>) -> Self {
        self.children = Some(Children { deployment, list });
        self
    }

    pub fn default_child(mut self, name: impl Into<String>) -> Self {
        self.default_child = Some(name.into());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Name followed by aliases: every token this descriptor answers to in its scope.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn answers_to(&self, token: &str) -> bool {
        self.names().any(|n| n == token)
    }

    pub fn child(&self, token: &str) -> Option<&CommandDescriptor> {
        self.children
            .as_ref()
            .and_then(|c| c.list.iter().find(|d| d.answers_to(token)))
    }

    pub fn child_by_name(&self, name: &str) -> Option<&CommandDescriptor> {
        self.children
            .as_ref()
            .and_then(|c| c.list.iter().find(|d| d.name == name))
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children
            .as_ref()
            .map(|c| c.list.iter().map(|d| d.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn deployment(&self) -> Option<Deployment> {
        self.children.as_ref().map(|c| c.deployment)
    }

    pub(crate) fn restrict(&mut self, rule: AccessRule) {
        self.access = AccessPolicy::Restricted(rule);
    }
}
