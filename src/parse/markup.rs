//! Target extraction from feed markup.
//!
//! The feed wraps combatant references in an emphasis span (`<b>...</b>`)
//! around a creature link (`<a exist="ID" noun="NOUN">display</a>`). Item
//! and equipment references use the same link tag but are never emphasized;
//! that distinction is the whole disambiguation rule here.

use crate::event::TargetIdentity;

const EMPH_OPEN: &str = "<b>";
const EMPH_CLOSE: &str = "</b>";
const LINK_OPEN: &str = "<a ";
const LINK_TEXT_START: &str = ">";
const LINK_CLOSE: &str = "</a>";

/// Extract a combat-target identity from one line, or `None` if the line
/// carries no emphasized creature link.
///
/// Only the minimal emphasis span is considered: the span ends at the first
/// `</b>` after each `<b>`, so one emphasis run can never accidentally cover
/// two separate creatures. Links outside emphasis are ignored. An `exist`
/// id that is non-positive or unparsable invalidates the match.
pub fn extract_target(line: &str) -> Option<TargetIdentity> {
    let mut rest = line;
    while let Some(open) = rest.find(EMPH_OPEN) {
        let after_open = &rest[open + EMPH_OPEN.len()..];
        let Some(close) = after_open.find(EMPH_CLOSE) else {
            return None;
        };
        let span = &after_open[..close];
        if let Some(target) = parse_link(span) {
            return Some(target);
        }
        rest = &after_open[close + EMPH_CLOSE.len()..];
    }
    None
}

/// Parse a `<a exist=".." noun="..">text</a>` link out of an emphasis span.
fn parse_link(span: &str) -> Option<TargetIdentity> {
    let open = span.find(LINK_OPEN)?;
    let tag_rest = &span[open + LINK_OPEN.len()..];
    let text_start = tag_rest.find(LINK_TEXT_START)?;
    let attrs = &tag_rest[..text_start];
    let after_attrs = &tag_rest[text_start + LINK_TEXT_START.len()..];
    let text_end = after_attrs.find(LINK_CLOSE)?;
    let display = after_attrs[..text_end].trim();

    let exist = attr_value(attrs, "exist")?;
    let noun = attr_value(attrs, "noun").unwrap_or_default();

    // Non-positive ids mark pseudo-objects in the feed, never combatants.
    let id: i64 = exist.trim().parse().ok()?;
    if id <= 0 {
        return None;
    }
    Some(TargetIdentity::new(id as u64, noun, display))
}

/// Pull `key="value"` out of a tag attribute list.
fn attr_value<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("{key}=\"");
    let start = attrs.find(&marker)? + marker.len();
    let rest = &attrs[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}
