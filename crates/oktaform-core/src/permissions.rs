//! Custom admin role permission canonicalization.
//!
//! Writing certain high-level permissions makes the platform report their
//! implied children on read. State must hold the form the user declared,
//! so an implied child is dropped whenever its parent is present.

use std::collections::BTreeSet;

/// `(parent, implied child)` pairs the platform expands on read.
pub const IMPLIED_PERMISSIONS: &[(&str, &str)] = &[
    ("okta.workflows.read", "okta.workflows.flows.read"),
    ("okta.workflows.invoke", "okta.workflows.flows.invoke"),
];

/// Canonical form: the input minus every child whose parent is present.
///
/// A child declared on its own (parent absent) is kept.
pub fn normalize<I, S>(permissions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut set: BTreeSet<String> = permissions.into_iter().map(Into::into).collect();
    for (parent, child) in IMPLIED_PERMISSIONS {
        if set.contains(*parent) {
            set.remove(*child);
        }
    }
    set
}

/// What the platform reports after `permissions` are written.
pub fn expand<I, S>(permissions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut set: BTreeSet<String> = permissions.into_iter().map(Into::into).collect();
    for (parent, child) in IMPLIED_PERMISSIONS {
        if set.contains(*parent) {
            set.insert((*child).to_string());
        }
    }
    set
}

/// Children the platform adds alongside `parent`.
pub fn implied_by(parent: &str) -> impl Iterator<Item = &'static str> + '_ {
    IMPLIED_PERMISSIONS
        .iter()
        .filter(move |(p, _)| *p == parent)
        .map(|(_, child)| *child)
}
