//! Line segmentation: keep-alive id, header token and body, plus the token cursor
//! the binder consumes.

use crate::ast::DEFAULT_SEPARATOR;
use crate::catalogue::{Catalogue, PacketId};

/// First split of a raw line, before any catalogue lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head<'a> {
    pub keep_alive_id: Option<u16>,
    /// First token after the keep-alive id.
    pub header: &'a str,
    /// The line from the header token to the end.
    pub from_header: &'a str,
    /// Everything after the header token and its separator. `None` when the line
    /// ends at the header.
    pub rest: Option<&'a str>,
}

/// Split a line on the default separator. A leading digit-only token is a
/// keep-alive id only when a non-empty token follows it. A line that is nothing
/// but such a number has an empty header and no body.
pub fn split_head(line: &str, detect_keep_alive: bool) -> Head<'_> {
    let (first, after) = split_once_opt(line, DEFAULT_SEPARATOR);
    if detect_keep_alive {
        match (parse_keep_alive(first), after) {
            (Some(id), Some(after)) if !after.is_empty() => {
                let (header, rest) = split_once_opt(after, DEFAULT_SEPARATOR);
                return Head { keep_alive_id: Some(id), header, from_header: after, rest };
            }
            (Some(_), None) => {
                let end = &line[line.len()..];
                return Head { keep_alive_id: None, header: end, from_header: end, rest: None };
            }
            _ => {}
        }
    }
    Head { keep_alive_id: None, header: first, from_header: line, rest: after }
}

fn split_once_opt(s: &str, sep: char) -> (&str, Option<&str>) {
    match s.split_once(sep) {
        Some((head, tail)) => (head, Some(tail)),
        None => (s, None),
    }
}

fn parse_keep_alive(token: &str) -> Option<u16> {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// A line after header resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub keep_alive_id: Option<u16>,
    /// Registered header on a hit, otherwise the raw first token.
    pub header: &'a str,
    pub definition: Option<PacketId>,
    pub body: Option<&'a str>,
}

impl<'a> Segment<'a> {
    /// Body tokens under the given top-level separator.
    pub fn tokens(&self, separator: char) -> Tokens<'a> {
        Tokens::new(self.body, separator)
    }
}

/// Resolve the header of a line against the catalogue.
///
/// An exact match on the space-delimited token wins. Otherwise the token is tried
/// against marker headers that share a custom separator with their fields
/// (`#fins^1^2`): the body then starts right after that separator. Last come
/// punctuation headers glued to their payload (`/0Lucifer0 hi`), where the body
/// starts right after the header.
pub fn segment<'a>(catalogue: &Catalogue, line: &'a str, detect_keep_alive: bool) -> Segment<'a> {
    let head = split_head(line, detect_keep_alive);
    if let Some(id) = catalogue.lookup(head.header) {
        return Segment {
            keep_alive_id: head.keep_alive_id,
            header: head.header,
            definition: Some(id),
            body: head.rest,
        };
    }
    if let Some((id, prefix_len)) = catalogue.resolve_marker(head.header) {
        let body_start = prefix_len + catalogue.definition(id).top_separator().len_utf8();
        return Segment {
            keep_alive_id: head.keep_alive_id,
            header: &head.from_header[..prefix_len],
            definition: Some(id),
            body: Some(&head.from_header[body_start..]),
        };
    }
    if let Some((id, prefix_len)) = catalogue.resolve_glued(head.header) {
        return Segment {
            keep_alive_id: head.keep_alive_id,
            header: &head.from_header[..prefix_len],
            definition: Some(id),
            body: Some(&head.from_header[prefix_len..]),
        };
    }
    Segment {
        keep_alive_id: head.keep_alive_id,
        header: head.header,
        definition: None,
        body: head.rest,
    }
}

/// Forward-only cursor over a body.
///
/// `None` body and an exhausted cursor are the same thing: no token remains. An
/// empty body still holds one empty token.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    body: &'a str,
    pos: Option<usize>,
    separator: char,
    last_separator_len: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(body: Option<&'a str>, separator: char) -> Self {
        Tokens {
            body: body.unwrap_or(""),
            pos: body.map(|_| 0),
            separator,
            last_separator_len: 0,
        }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos.is_none()
    }

    /// Unconsumed input, verbatim.
    pub fn remaining(&self) -> Option<&'a str> {
        self.pos.map(|p| &self.body[p..])
    }

    pub fn next_token(&mut self) -> Option<&'a str> {
        self.next_until(self.separator)
    }

    /// Next token ending at `sep` instead of the cursor's separator.
    pub fn next_until(&mut self, sep: char) -> Option<&'a str> {
        let p = self.pos?;
        let rest = &self.body[p..];
        match rest.find(sep) {
            Some(i) => {
                self.pos = Some(p + i + sep.len_utf8());
                self.last_separator_len = sep.len_utf8();
                Some(&rest[..i])
            }
            None => {
                self.pos = None;
                self.last_separator_len = 0;
                Some(rest)
            }
        }
    }

    pub fn peek_until(&self, sep: char) -> Option<&'a str> {
        let rest = self.remaining()?;
        Some(rest.find(sep).map_or(rest, |i| &rest[..i]))
    }

    /// Take everything left, separators included.
    pub fn take_rest(&mut self) -> Option<&'a str> {
        let p = self.pos.take()?;
        self.last_separator_len = 0;
        Some(&self.body[p..])
    }

    /// Byte offset of the cursor; `body.len()` once exhausted.
    pub fn offset(&self) -> usize {
        self.pos.unwrap_or(self.body.len())
    }

    /// Text consumed since `start` (an earlier [`offset`](Self::offset)), without the
    /// separator that ended the last token.
    pub fn consumed_since(&self, start: usize) -> &'a str {
        let end = match self.pos {
            Some(p) => p.saturating_sub(self.last_separator_len),
            None => self.body.len(),
        };
        if end <= start {
            ""
        } else {
            &self.body[start..end]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_needs_following_token() {
        let h = split_head("1234 0", true);
        assert_eq!(h.keep_alive_id, Some(1234));
        assert_eq!(h.header, "0");
        assert_eq!(h.rest, None);

        let h = split_head("1234", true);
        assert_eq!(h.keep_alive_id, None);
        assert_eq!(h.header, "");
        assert_eq!(h.rest, None);

        let h = split_head("1234", false);
        assert_eq!(h.header, "1234");
    }

    #[test]
    fn keep_alive_detection_can_be_disabled() {
        let h = split_head("12 walk 1 2", false);
        assert_eq!(h.keep_alive_id, None);
        assert_eq!(h.header, "12");
        assert_eq!(h.rest, Some("walk 1 2"));
    }

    #[test]
    fn oversized_number_is_a_header() {
        let h = split_head("99999999 walk", true);
        assert_eq!(h.keep_alive_id, None);
        assert_eq!(h.header, "99999999");
    }

    #[test]
    fn tokens_and_rest() {
        let mut t = Tokens::new(Some("a b  c d e"), ' ');
        assert_eq!(t.next_token(), Some("a"));
        assert_eq!(t.next_token(), Some("b"));
        assert_eq!(t.next_token(), Some(""));
        assert_eq!(t.take_rest(), Some("c d e"));
        assert!(t.is_exhausted());
        assert_eq!(t.next_token(), None);
    }

    #[test]
    fn empty_body_has_one_empty_token() {
        let mut t = Tokens::new(Some(""), ' ');
        assert!(!t.is_exhausted());
        assert_eq!(t.next_token(), Some(""));
        assert!(t.is_exhausted());

        let t = Tokens::new(None, ' ');
        assert!(t.is_exhausted());
    }

    #[test]
    fn override_separator_and_consumed_text() {
        let mut t = Tokens::new(Some("00564F36\u{b}0.9.3.3097 0 md5"), ' ');
        let start = t.offset();
        assert_eq!(t.next_until('\u{b}'), Some("00564F36"));
        assert_eq!(t.consumed_since(start), "00564F36");
        let start = t.offset();
        assert_eq!(t.next_token(), Some("0.9.3.3097"));
        assert_eq!(t.next_token(), Some("0"));
        assert_eq!(t.consumed_since(start), "0.9.3.3097 0");
        assert_eq!(t.peek_until(' '), Some("md5"));
    }
}
