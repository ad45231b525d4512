//! Deliberately naive glob matching: `*` becomes `.*`, every other
//! regex metacharacter is escaped, and the result is anchored on both ends.
//! This is NOT shell-style globbing (no directory semantics for `*`, no
//! `?`, no character classes) -- the source this was distilled from used
//! exactly this simplified scheme, and substituting richer glob semantics
//! would silently change which paths/domains match. See REDESIGN FLAGS: none.

use regex_lite::Regex;

fn escape_and_star(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '.' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            other => out.push(other),
        }
    }
    out
}

/// Compile `pattern` into an anchored matcher over whole strings.
pub fn compile(pattern: &str) -> Option<Regex> {
    let anchored = format!("^{}$", escape_and_star(pattern));
    Regex::new(&anchored).ok()
}

pub fn matches(pattern: &str, value: &str) -> bool {
    compile(pattern).is_some_and(|re| re.is_match(value))
}

pub fn any_matches(patterns: &[String], value: &str) -> bool {
    patterns.iter().any(|p| matches(p, value))
}

/// Domain-specific variant: a pattern `*.x.y` additionally matches the bare
/// domain `x.y` (not just subdomains of it).
pub fn domain_matches(pattern: &str, domain: &str) -> bool {
    if matches(pattern, domain) {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return suffix == domain;
    }
    false
}

pub fn any_domain_matches(patterns: &[String], domain: &str) -> bool {
    patterns.iter().any(|p| domain_matches(p, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run_of_characters() {
        assert!(matches("src/*.rs", "src/main.rs"));
        assert!(matches("src/*.rs", "src/deep/nested.rs"));
        assert!(!matches("src/*.rs", "src/main.txt"));
    }

    #[test]
    fn metacharacters_in_pattern_are_escaped() {
        assert!(matches("a.b", "a.b"));
        assert!(!matches("a.b", "axb"));
    }

    #[test]
    fn domain_wildcard_also_matches_bare_domain() {
        assert!(domain_matches("*.example.com", "example.com"));
        assert!(domain_matches("*.example.com", "api.example.com"));
        assert!(!domain_matches("*.example.com", "example.org"));
    }
}
