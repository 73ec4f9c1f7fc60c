//! Field whitelisting for client-supplied sort and search fields.

use std::borrow::Borrow;
use std::collections::BTreeSet;

/// Return `requested` if it is whitelisted, otherwise `fallback`.
///
/// Never yields a field outside `whitelist ∪ {fallback}`. Empty or absent
/// requests resolve to the fallback.
pub fn resolve_field<'a, S>(
    requested: Option<&'a str>,
    whitelist: &BTreeSet<S>,
    fallback: &'a str,
) -> &'a str
where
    S: Borrow<str> + Ord,
{
    match requested {
        Some(field) if whitelist.contains(field) => field,
        _ => fallback,
    }
}
