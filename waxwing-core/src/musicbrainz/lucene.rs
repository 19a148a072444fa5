//! Lucene query escaping for MusicBrainz search endpoints.

/// Escape Lucene special characters so user-controlled titles and names can
/// be embedded in a query string verbatim.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '+' | '-' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~' | '*' | '?'
            | ':' | '\\' | '/' | '&' | '|' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_plain_text_through() {
        assert_eq!(escape("Abbey Road"), "Abbey Road");
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape("AC/DC"), "AC\\/DC");
        assert_eq!(escape("What?"), "What\\?");
        assert_eq!(escape("a:b"), "a\\:b");
        assert_eq!(escape("(live)"), "\\(live\\)");
    }
}
