//! Tag matcher: decides which member, if any, a message is addressed as.
//!
//! Pure string matching on literal prefix/suffix tags. Members are tried in
//! registry order and the first match wins; there is no "most specific tag"
//! preference.

use crate::system::Member;

/// A member matched by its tags and the message text with the tags removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyMatch<'a> {
    pub member: &'a Member,
    pub content: String,
}

/// Find the first member whose tags match `text`.
pub fn match_tags<'a>(text: &str, members: &'a [Member]) -> Option<ProxyMatch<'a>> {
    members.iter().find_map(|member| {
        strip_tags(text, member.proxy_prefix(), member.proxy_suffix()).map(|content| ProxyMatch {
            member,
            content,
        })
    })
}

/// Strip a prefix and/or suffix from `text`, returning the trimmed inner text.
///
/// Returns `None` when neither tag is set or the text doesn't carry them.
/// With both tags set, the prefix is removed from the start and the suffix
/// from the end of the original text, so overlapping tags never produce a
/// negative-length slice.
pub fn strip_tags(text: &str, prefix: Option<&str>, suffix: Option<&str>) -> Option<String> {
    let inner = match (prefix, suffix) {
        (Some(p), Some(s)) => {
            if p.len() + s.len() > text.len() || !text.starts_with(p) || !text.ends_with(s) {
                return None;
            }
            &text[p.len()..text.len() - s.len()]
        }
        (Some(p), None) => text.strip_prefix(p)?,
        (None, Some(s)) => text.strip_suffix(s)?,
        (None, None) => return None,
    };
    Some(inner.trim().to_string())
}
