//! Attribute-level diff between desired and observed roles

use crate::role::{CanonicalRole, ObservedRole, RoleAttributes};

/// Compute the attributes that must change to converge `observed`
///
/// Only attributes the operator specified are considered. When
/// `force_refresh` is set, a specified credential is always included because
/// the stored value could not be read back for comparison.
pub fn diff(
    desired: &CanonicalRole,
    observed: &ObservedRole,
    force_refresh: bool,
) -> RoleAttributes {
    let want = &desired.attributes;

    RoleAttributes {
        superuser: changed(want.superuser, observed.superuser),
        createdb: changed(want.createdb, observed.createdb),
        createrole: changed(want.createrole, observed.createrole),
        login: changed(want.login, observed.login),
        inherit: changed(want.inherit, observed.inherit),
        replication: changed(want.replication, observed.replication),
        connection_limit: changed(want.connection_limit, observed.connection_limit),
        valid_until: want
            .valid_until
            .filter(|at| observed.valid_until != Some(*at)),
        credential: want.credential.as_ref().and_then(|credential| {
            let stored = observed.credential.as_deref().unwrap_or_default();
            (force_refresh || stored != credential).then(|| credential.clone())
        }),
        groups: want.groups.as_ref().and_then(|groups| {
            let missing: Vec<String> = groups
                .iter()
                .filter(|g| !observed.groups.contains(g))
                .cloned()
                .collect();
            (!missing.is_empty()).then_some(missing)
        }),
    }
}

fn changed<T: PartialEq>(want: Option<T>, have: T) -> Option<T> {
    want.filter(|w| *w != have)
}
