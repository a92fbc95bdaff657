//! Access evaluation for commands.
//!
//! [`evaluate`] is a total, side-effect-free function of (policy, invoker). Both the
//! dispatcher and the listing subsystem go through [`evaluate_path`], so what is
//! advertised to a user and what that user can run never diverge.
//!
//! Rule order:
//! 1. blacklisted identities are denied, whatever else holds;
//! 2. a non-empty whitelist denies everyone not on it;
//! 3. every required capability must be held;
//! 4. otherwise allow.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Who is invoking a command, as reported by the platform adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invoker {
    pub id: String,
    pub capabilities: BTreeSet<String>,
}

impl Invoker {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AccessPolicy {
    #[default]
    Public,
    Restricted(AccessRule),
}

impl AccessPolicy {
    pub fn whitelist<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessPolicy::Restricted(AccessRule {
            whitelist: ids.into_iter().map(Into::into).collect(),
            ..AccessRule::default()
        })
    }

    pub fn requires<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessPolicy::Restricted(AccessRule {
            required_capabilities: capabilities.into_iter().map(Into::into).collect(),
            ..AccessRule::default()
        })
    }

    pub fn is_public(&self) -> bool {
        matches!(self, AccessPolicy::Public)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Blacklisted,
    NotWhitelisted,
    MissingCapabilities(Vec<String>),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Blacklisted => write!(f, "you are blacklisted from this command"),
            DenyReason::NotWhitelisted => write!(f, "you are not on this command's whitelist"),
            DenyReason::MissingCapabilities(caps) => {
                write!(f, "missing capabilities: {}", caps.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub whitelisted: bool,
    pub blacklisted: bool,
    pub reason: Option<DenyReason>,
}

impl AccessDecision {
    fn allow(whitelisted: bool) -> Self {
        Self {
            allowed: true,
            whitelisted,
            blacklisted: false,
            reason: None,
        }
    }
}

pub fn evaluate(policy: &AccessPolicy, invoker: &Invoker) -> AccessDecision {
    let rule = match policy {
        AccessPolicy::Public => return AccessDecision::allow(false),
        AccessPolicy::Restricted(rule) => rule,
    };

    let whitelisted = rule.whitelist.iter().any(|id| *id == invoker.id);
    let blacklisted = rule.blacklist.iter().any(|id| *id == invoker.id);

    let reason = if blacklisted {
        Some(DenyReason::Blacklisted)
    } else if !rule.whitelist.is_empty() && !whitelisted {
        Some(DenyReason::NotWhitelisted)
    } else {
        let missing: Vec<String> = rule
            .required_capabilities
            .iter()
            .filter(|c| !invoker.capabilities.contains(*c))
            .cloned()
            .collect();
        (!missing.is_empty()).then_some(DenyReason::MissingCapabilities(missing))
    };

    AccessDecision {
        allowed: reason.is_none(),
        whitelisted,
        blacklisted,
        reason,
    }
}

/// Conjunction of [`evaluate`] over every descriptor on a resolved path, root first.
/// The first denial wins.
pub fn evaluate_path<'a, I>(policies: I, invoker: &Invoker) -> AccessDecision
where
    I: IntoIterator<Item = &'a AccessPolicy>,
{
    let mut whitelisted = false;
    for policy in policies {
        let decision = evaluate(policy, invoker);
        if !decision.allowed {
            return decision;
        }
        whitelisted |= decision.whitelisted;
    }
    AccessDecision::allow(whitelisted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(white: &[&str], black: &[&str], caps: &[&str]) -> AccessPolicy {
        AccessPolicy::Restricted(AccessRule {
            whitelist: white.iter().map(|s| s.to_string()).collect(),
            blacklist: black.iter().map(|s| s.to_string()).collect(),
            required_capabilities: caps.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn public_allows_everyone() {
        let d = evaluate(&AccessPolicy::Public, &Invoker::new("anyone"));
        assert!(d.allowed);
        assert!(!d.whitelisted && !d.blacklisted);
    }

    #[test]
    fn blacklist_beats_whitelist() {
        let policy = rule(&["alice"], &["alice"], &[]);
        let d = evaluate(&policy, &Invoker::new("alice"));
        assert!(!d.allowed);
        assert!(d.whitelisted && d.blacklisted);
        assert_eq!(d.reason, Some(DenyReason::Blacklisted));
    }

    #[test]
    fn whitelist_excludes_others() {
        let policy = rule(&["alice"], &[], &[]);
        assert!(evaluate(&policy, &Invoker::new("alice")).allowed);
        let d = evaluate(&policy, &Invoker::new("bob"));
        assert_eq!(d.reason, Some(DenyReason::NotWhitelisted));
    }

    #[test]
    fn capabilities_all_required() {
        let policy = rule(&[], &[], &["admin", "voice"]);
        let partial = Invoker::new("bob").with_capability("admin");
        assert_eq!(
            evaluate(&policy, &partial).reason,
            Some(DenyReason::MissingCapabilities(vec!["voice".into()]))
        );
        let full = partial.with_capability("voice");
        assert!(evaluate(&policy, &full).allowed);
    }

    #[test]
    fn whitelisted_still_needs_capabilities() {
        let policy = rule(&["alice"], &[], &["admin"]);
        assert!(!evaluate(&policy, &Invoker::new("alice")).allowed);
    }

    #[test]
    fn path_denies_when_any_level_denies() {
        let parent = rule(&["alice"], &[], &[]);
        let child = AccessPolicy::Public;
        assert!(evaluate_path([&parent, &child], &Invoker::new("alice")).allowed);
        assert!(!evaluate_path([&parent, &child], &Invoker::new("bob")).allowed);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let policy = rule(&["a"], &["b"], &["x"]);
        let invoker = Invoker::new("a").with_capability("x");
        assert_eq!(evaluate(&policy, &invoker), evaluate(&policy, &invoker));
    }
}
