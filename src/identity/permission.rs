//! Permission checks over an identity's grant list.

use crate::identity::claims::{Identity, ALL, ANY};

/// Decide whether `identity` may perform `action` in `category` within
/// `context`, scoped to `tenant_id`.
///
/// A superuser acting inside its own tenant bypasses the grant list
/// entirely. Otherwise the grants are scanned in order and only the FIRST
/// entry whose context matches (exactly or via the `ALL` wildcard) is
/// consulted: the actions under the requested category and under `ANY`
/// are unioned, and the union must contain the action or the `ALL`
/// wildcard. Later grants for the same context are intentionally ignored;
/// existing rule documents depend on that.
pub fn check_permission(
    identity: &Identity,
    tenant_id: &str,
    context: &str,
    category: &str,
    action: &str,
) -> bool {
    if identity.superuser && identity.tenant_id == tenant_id {
        return true;
    }

    let grant = identity
        .permissions
        .iter()
        .find(|p| p.context == ALL || p.context == context);

    let Some(grant) = grant else {
        return false;
    };

    let mut allowed = grant
        .category_actions
        .get(ANY)
        .into_iter()
        .flatten()
        .chain(grant.category_actions.get(category).into_iter().flatten());

    allowed.any(|a| a == ALL || a == action)
}
