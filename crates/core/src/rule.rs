// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling rules
//!
//! A rule is a predicate-based lock token. Two rules *conflict* when they must
//! not be held by different threads at the same time, and a rule *contains*
//! another when holding it already covers everything the other guards.
//!
//! Rules are not compared by identity: a path rule for `/proj/src/a.rs`
//! conflicts with the rule for its project `/proj` even though the two are
//! different values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Conflict predicate over resource identities supplied by a resource domain
///
/// Implementations must be pure: `conflicts_with` symmetric and `contains`
/// reflexive. [`Rule`] enforces both at the call site, so an implementation
/// only needs to answer for the rule kinds it knows about and return `false`
/// otherwise.
pub trait SchedulingRule: fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// True if holding `self` covers everything `other` would guard
    fn contains(&self, other: &dyn SchedulingRule) -> bool;

    /// True if `self` and `other` must not be held concurrently by different threads
    fn conflicts_with(&self, other: &dyn SchedulingRule) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a scheduling rule
#[derive(Clone)]
pub struct Rule(Arc<dyn SchedulingRule>);

impl Rule {
    pub fn new(rule: impl SchedulingRule) -> Self {
        Self(Arc::new(rule))
    }

    /// The universal "no rule" sentinel
    pub fn none() -> Self {
        Self::new(NoRule)
    }

    /// Rule guarding a hierarchical resource path
    pub fn path(path: impl AsRef<str>) -> Self {
        Self::new(PathRule::new(path))
    }

    /// Named mutex rule
    pub fn exclusive(name: impl Into<String>) -> Self {
        Self::new(ExclusiveRule::new(name))
    }

    pub fn is_none(&self) -> bool {
        self.0.as_any().is::<NoRule>()
    }

    /// True if both handles point at the same rule value
    pub fn same(&self, other: &Rule) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn contains(&self, other: &Rule) -> bool {
        if other.is_none() || self.same(other) {
            return true;
        }
        if self.is_none() {
            return false;
        }
        self.0.contains(other.0.as_ref())
    }

    pub fn conflicts_with(&self, other: &Rule) -> bool {
        if self.is_none() || other.is_none() {
            return false;
        }
        self.0.conflicts_with(other.0.as_ref()) || other.0.conflicts_with(self.0.as_ref())
    }

    pub fn as_rule(&self) -> &dyn SchedulingRule {
        self.0.as_ref()
    }

    pub fn downcast_ref<T: SchedulingRule>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Sentinel that never conflicts and is contained by every rule
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoRule;

impl SchedulingRule for NoRule {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        other.as_any().is::<NoRule>()
    }

    fn conflicts_with(&self, _other: &dyn SchedulingRule) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for NoRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "none")
    }
}

/// Rule over a `/`-separated resource path
///
/// A path covers itself and everything below it, so `/proj` conflicts with
/// and contains `/proj/src/a.rs`. Siblings never conflict. The root path `/`
/// covers every path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathRule {
    segments: Vec<String>,
}

impl PathRule {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            segments: path
                .as_ref()
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True if `self` is an ancestor of (or equal to) `other`
    pub fn is_prefix_of(&self, other: &PathRule) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl SchedulingRule for PathRule {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        let any = other.as_any();
        if let Some(path) = any.downcast_ref::<PathRule>() {
            return self.is_prefix_of(path);
        }
        if let Some(multi) = any.downcast_ref::<MultiRule>() {
            return multi
                .children()
                .iter()
                .all(|child| self.contains(child.as_rule()));
        }
        any.is::<NoRule>()
    }

    fn conflicts_with(&self, other: &dyn SchedulingRule) -> bool {
        let any = other.as_any();
        if let Some(path) = any.downcast_ref::<PathRule>() {
            return self.is_prefix_of(path) || path.is_prefix_of(self);
        }
        if let Some(multi) = any.downcast_ref::<MultiRule>() {
            return multi.conflicts_with(self);
        }
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for PathRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// Named mutex: conflicts only with an exclusive rule of the same name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExclusiveRule {
    name: String,
}

impl ExclusiveRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SchedulingRule for ExclusiveRule {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        other
            .as_any()
            .downcast_ref::<ExclusiveRule>()
            .is_some_and(|o| o.name == self.name)
    }

    fn conflicts_with(&self, other: &dyn SchedulingRule) -> bool {
        self.contains(other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for ExclusiveRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exclusive:{}", self.name)
    }
}

/// Union of several rules
///
/// Built with [`MultiRule::combine`], which flattens nested multi-rules and
/// drops `none` children, so children are never multi-rules themselves.
#[derive(Clone, Debug)]
pub struct MultiRule {
    children: Vec<Rule>,
}

impl MultiRule {
    /// Combine rules into one
    ///
    /// Returns `Rule::none()` for an empty input and the single rule itself
    /// when only one non-none rule remains.
    pub fn combine(rules: impl IntoIterator<Item = Rule>) -> Rule {
        let mut children = Vec::new();
        for rule in rules {
            if rule.is_none() {
                continue;
            }
            match rule.downcast_ref::<MultiRule>() {
                Some(multi) => children.extend(multi.children.iter().cloned()),
                None => children.push(rule),
            }
        }

        match children.len() {
            0 => Rule::none(),
            1 => children.remove(0),
            _ => Rule::new(MultiRule { children }),
        }
    }

    pub fn children(&self) -> &[Rule] {
        &self.children
    }
}

impl SchedulingRule for MultiRule {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        if let Some(multi) = other.as_any().downcast_ref::<MultiRule>() {
            return multi
                .children
                .iter()
                .all(|theirs| self.contains(theirs.as_rule()));
        }
        self.children
            .iter()
            .any(|mine| mine.as_rule().contains(other))
    }

    fn conflicts_with(&self, other: &dyn SchedulingRule) -> bool {
        self.children.iter().any(|mine| {
            mine.as_rule().conflicts_with(other) || other.conflicts_with(mine.as_rule())
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for MultiRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.children.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
