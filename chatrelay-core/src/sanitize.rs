//! Neutralizing markup in user-supplied text.
//!
//! Every string a client sends that may be echoed to another client's page
//! (channel, identifier, display name, chat text) passes through [`sanitize`]
//! before it is stored or rebroadcast. Markup-significant ASCII characters are
//! mapped one-for-one to their full-width forms, so the output can never open
//! a tag or an entity, re-sanitizing is a no-op, and character counts are
//! preserved (truncation and sanitizing commute).

/// Maximum number of characters kept from a display name.
pub const DISPLAY_NAME_MAX_CHARS: usize = 10;

/// Label used when a client joins without a usable display name.
pub const DEFAULT_DISPLAY_NAME: &str = "名無し";

/// Replaces `< > & " '` with `＜ ＞ ＆ ＂ ＇`.
///
/// # Examples
///
/// ```
/// use chatrelay_core::sanitize::sanitize;
///
/// let once = sanitize("<script>alert('x')</script>");
/// assert_eq!(once, "＜script＞alert(＇x＇)＜/script＞");
/// assert_eq!(sanitize(&once), once);
/// ```
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '<' => '＜',
            '>' => '＞',
            '&' => '＆',
            '"' => '＂',
            '\'' => '＇',
            other => other,
        })
        .collect()
}

/// Keeps the first [`DISPLAY_NAME_MAX_CHARS`] characters.
pub fn truncate_display_name(name: &str) -> String {
    name.chars().take(DISPLAY_NAME_MAX_CHARS).collect()
}

/// Normalizes a display name supplied with a handshake.
///
/// Absent and empty names fall back to [`DEFAULT_DISPLAY_NAME`].
pub fn display_name(raw: Option<&str>) -> String {
    match raw {
        Some(name) if !name.is_empty() => truncate_display_name(&sanitize(name)),
        _ => DEFAULT_DISPLAY_NAME.to_string(),
    }
}
