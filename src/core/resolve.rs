//! Dispatch resolution: invocation -> (leaf descriptor, validated args).
//!
//! 1. Root match on the first token (name, alias, root alias, or shortcut).
//! 2. Descend while the current descriptor has children, consuming one token per
//!    level; an unmatched or missing token falls back to the default child without
//!    being consumed, otherwise the walk stops with `UnknownSubcommand`.
//! 3. At the leaf, run its extraction template on what is left and validate.
//!
//! Target resolution and argument binding are separate steps so the access check
//! can sit between them.

use crate::core::descriptor::CommandDescriptor;
use crate::core::error::DispatchError;
use crate::core::invocation::Invocation;
use crate::core::option::{self, Args};
use crate::core::registry::{self, Registry, RootEntry};
use tracing::debug;

/// A resolved leaf and the text its template still has to parse.
#[derive(Debug, Clone)]
pub struct Target<'r> {
    /// Root first, leaf last.
    pub path: Vec<&'r CommandDescriptor>,
    pub leaf: &'r CommandDescriptor,
    pub remainder: String,
    /// Shortcut that was expanded to reach this target, if any.
    pub shortcut: Option<String>,
}

impl Target<'_> {
    pub fn display(&self) -> String {
        registry::display_path(&self.path)
    }
}

#[derive(Debug, Clone)]
pub struct Resolved<'r> {
    pub target: Target<'r>,
    pub args: Args,
}

fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(i) => Some((&s[..i], &s[i..])),
        None => Some((s, "")),
    }
}

pub fn resolve_target<'r>(
    registry: &'r Registry,
    invocation: &Invocation,
) -> Result<Target<'r>, DispatchError> {
    let (head, rest) = next_token(&invocation.body).ok_or(DispatchError::EmptyInvocation)?;

    let (index_path, mut remainder, shortcut) = match registry.lookup_root(head) {
        Some(RootEntry::Command(idx)) => (idx.clone(), rest.to_string(), None),
        Some(RootEntry::Shortcut(expansion)) if invocation.is_text() => {
            let expanded = format!("{expansion}{rest}");
            debug!(shortcut = head, expanded = %expanded, "expanding shortcut");
            let (inner, inner_rest) =
                next_token(&expanded).ok_or(DispatchError::EmptyInvocation)?;
            match registry.lookup_root(inner) {
                Some(RootEntry::Command(idx)) => {
                    (idx.clone(), inner_rest.to_string(), Some(head.to_string()))
                }
                _ => {
                    return Err(DispatchError::UnknownCommand {
                        name: inner.to_string(),
                    });
                }
            }
        }
        _ => {
            return Err(DispatchError::UnknownCommand {
                name: head.to_string(),
            });
        }
    };

    let mut path = registry.descriptor_path(&index_path);
    let Some(mut current) = path.last().copied() else {
        return Err(DispatchError::UnknownCommand {
            name: head.to_string(),
        });
    };

    while !current.is_leaf() {
        let token = next_token(&remainder).map(|(t, after)| (t.to_string(), after.to_string()));
        let matched = token
            .as_ref()
            .and_then(|(t, after)| current.child(t).map(|c| (c, after.clone())));

        if let Some((child, after)) = matched {
            debug!(parent = %current.name, child = %child.name, "descending");
            path.push(child);
            remainder = after;
            current = child;
            continue;
        }

        let default = current
            .default_child
            .as_deref()
            .and_then(|d| current.child_by_name(d));
        match default {
            Some(child) => {
                debug!(parent = %current.name, child = %child.name, "falling back to default child");
                path.push(child);
                current = child;
            }
            None => {
                return Err(DispatchError::UnknownSubcommand {
                    parent: registry::display_path(&path),
                    given: token.map(|(t, _)| t).unwrap_or_default(),
                    choices: current.child_names(),
                });
            }
        }
    }

    Ok(Target {
        path,
        leaf: current,
        remainder,
        shortcut,
    })
}

/// Run the leaf's extraction template, then validate against its options.
pub fn bind_args(target: &Target<'_>, invocation: &Invocation) -> Result<Args, DispatchError> {
    let record = target.leaf.template.extract(invocation, &target.remainder);
    option::validate_all(&target.leaf.options, &record)
        .map_err(|e| e.into_dispatch(&target.display()))
}

pub fn resolve<'r>(
    registry: &'r Registry,
    invocation: &Invocation,
) -> Result<Resolved<'r>, DispatchError> {
    let target = resolve_target(registry, invocation)?;
    let args = bind_args(&target, invocation)?;
    Ok(Resolved { target, args })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::envelope::PipeEnvelope;
    use crate::core::error::ErrorKind;
    use crate::core::extract::ArgTemplate;
    use crate::core::handler::handler_fn;
    use crate::core::option::OptionSpec;
    use crate::core::registry::RegistryBuilder;

    fn leaf(name: &str) -> CommandDescriptor {
        CommandDescriptor::new(name).handler(handler_fn(|_ctx| async { Ok(PipeEnvelope::ok("ok")) }))
    }

    fn registry() -> Registry {
        let mut b = RegistryBuilder::new();
        b.register(
            leaf("say")
                .alias("echo")
                .option(OptionSpec::string("text").required())
                .template(ArgTemplate::remainder("text")),
        )
        .unwrap();
        b.register(
            CommandDescriptor::new("todo")
                .merge(vec![
                    leaf("add")
                        .alias("new")
                        .root_alias("remember")
                        .option(OptionSpec::string("item").required())
                        .template(ArgTemplate::remainder("item")),
                    leaf("list"),
                ])
                .default_child("list"),
        )
        .unwrap();
        b.register(CommandDescriptor::new("parent").split(vec![leaf("a"), leaf("b")]))
            .unwrap();
        b.shortcut("greet", "say hello").unwrap();
        b.shortcut("loop", "greet").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn resolves_alias_and_args() {
        let reg = registry();
        let r = resolve(&reg, &Invocation::text("echo  hi there")).unwrap();
        assert_eq!(r.target.display(), "say");
        assert_eq!(r.args.str("text"), Some("hi there"));
    }

    #[test]
    fn unknown_command_never_panics() {
        let reg = registry();
        let err = resolve(&reg, &Invocation::text("frobnicate now")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
        assert_eq!(
            resolve(&reg, &Invocation::text("   ")).unwrap_err(),
            DispatchError::EmptyInvocation
        );
        // Case-sensitive.
        assert_eq!(
            resolve(&reg, &Invocation::text("SAY hi")).unwrap_err().kind(),
            ErrorKind::UnknownCommand
        );
    }

    #[test]
    fn descends_into_children() {
        let reg = registry();
        let r = resolve(&reg, &Invocation::text("todo new buy milk")).unwrap();
        assert_eq!(r.target.display(), "todo add");
        assert_eq!(r.args.str("item"), Some("buy milk"));
    }

    #[test]
    fn default_child_does_not_consume() {
        let reg = registry();
        let r = resolve(&reg, &Invocation::text("todo")).unwrap();
        assert_eq!(r.target.display(), "todo list");
        let t = resolve_target(&reg, &Invocation::text("todo whatever")).unwrap();
        assert_eq!(t.display(), "todo list");
        assert_eq!(t.remainder.trim(), "whatever");
    }

    #[test]
    fn unknown_subcommand_names_parent() {
        let reg = registry();
        let err = resolve(&reg, &Invocation::text("parent unknownchild")).unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnknownSubcommand {
                parent: "parent".into(),
                given: "unknownchild".into(),
                choices: vec!["a".into(), "b".into()],
            }
        );
        let err = resolve(&reg, &Invocation::text("parent")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSubcommand);
    }

    #[test]
    fn root_alias_reaches_nested_leaf() {
        let reg = registry();
        let r = resolve(&reg, &Invocation::text("remember eggs")).unwrap();
        assert_eq!(r.target.display(), "todo add");
        assert_eq!(r.args.str("item"), Some("eggs"));
    }

    #[test]
    fn shortcut_expands_once() {
        let reg = registry();
        let r = resolve(&reg, &Invocation::text("greet")).unwrap();
        assert_eq!(r.target.display(), "say");
        assert_eq!(r.args.str("text"), Some("hello"));
        assert_eq!(r.target.shortcut.as_deref(), Some("greet"));

        let r = resolve(&reg, &Invocation::text("greet world")).unwrap();
        assert_eq!(r.args.str("text"), Some("hello world"));

        let err = resolve(&reg, &Invocation::text("loop")).unwrap_err();
        assert_eq!(err, DispatchError::UnknownCommand { name: "greet".into() });
    }

    #[test]
    fn missing_argument_reported_with_path() {
        let reg = registry();
        let err = resolve(&reg, &Invocation::text("todo add")).unwrap_err();
        assert_eq!(
            err,
            DispatchError::MissingArgument {
                command: "todo add".into(),
                option: "item".into(),
            }
        );
    }
}
