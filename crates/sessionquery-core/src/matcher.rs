use crate::registry::{RegistrySnapshot, SessionEntry};

/// Result of resolving a name fragment
#[derive(Debug, PartialEq, Eq)]
pub enum MatchResult<'a> {
    /// First session in traversal order whose name contains the fragment
    Found(&'a SessionEntry),
    /// No session name contains the fragment
    NotFound,
}

/// Resolve `fragment` against a snapshot.
///
/// Case-sensitive substring containment; the first hit in window, tab,
/// session order wins. Callers never pass an empty fragment.
pub fn find_session<'a>(snapshot: &'a RegistrySnapshot, fragment: &str) -> MatchResult<'a> {
    debug_assert!(!fragment.is_empty(), "empty fragment means listing mode");

    match snapshot.iter().find(|entry| entry.name.contains(fragment)) {
        Some(entry) => MatchResult::Found(entry),
        None => MatchResult::NotFound,
    }
}
