//! Redis-style glob patterns (`*`, `?`, `[...]`, `\` escapes).

const META: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Escape glob metacharacters so `raw` matches only itself.
pub fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Match `text` against a glob pattern with the semantics Redis uses for
/// `SCAN MATCH` / `KEYS`.
pub fn glob_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    match_from(&p, &t)
}

fn match_from(p: &[char], t: &[char]) -> bool {
    let (mut pi, mut ti) = (0, 0);
    // Backtrack point for the most recent `*`.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        let step = if pi < p.len() {
            match p[pi] {
                '*' => {
                    star = Some((pi, ti));
                    pi += 1;
                    continue;
                }
                '?' => Some(pi + 1),
                '[' => match_class(p, pi, t[ti]),
                '\\' if pi + 1 < p.len() => (p[pi + 1] == t[ti]).then_some(pi + 2),
                c => (c == t[ti]).then_some(pi + 1),
            }
        } else {
            None
        };

        match step {
            Some(next) => {
                pi = next;
                ti += 1;
            }
            None => match star {
                Some((star_pi, star_ti)) => {
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    star = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

/// Match one character against the class starting at `p[start] == '['`.
/// Returns the index just past the closing `]` on success.
fn match_class(p: &[char], start: usize, c: char) -> Option<usize> {
    let mut i = start + 1;
    let negate = p.get(i) == Some(&'^');
    if negate {
        i += 1;
    }
    let mut matched = false;
    loop {
        match p.get(i) {
            // Unterminated class: Redis treats the rest as the class body.
            None => break,
            Some(']') => {
                i += 1;
                break;
            }
            Some('\\') if i + 1 < p.len() => {
                matched |= p[i + 1] == c;
                i += 2;
            }
            Some(&lo) if p.get(i + 1) == Some(&'-') && i + 2 < p.len() && p[i + 2] != ']' => {
                let hi = p[i + 2];
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                matched |= (lo..=hi).contains(&c);
                i += 3;
            }
            Some(&other) => {
                matched |= other == c;
                i += 1;
            }
        }
    }
    (matched != negate).then_some(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_patterns() {
        assert!(glob_matches("*orders*", "orders:list:{}"));
        assert!(glob_matches("*orders*", "payments:list:{\"orders\":1}"));
        assert!(!glob_matches("*orders*", "products:list:{}"));
        assert!(glob_matches("**", ""));
        assert!(glob_matches("*", "anything"));
    }

    #[test]
    fn single_char_and_classes() {
        assert!(glob_matches("h?llo", "hello"));
        assert!(!glob_matches("h?llo", "hllo"));
        assert!(glob_matches("h[ae]llo", "hallo"));
        assert!(!glob_matches("h[^e]llo", "hello"));
        assert!(glob_matches("h[a-c]llo", "hbllo"));
        assert!(!glob_matches("h[a-c]llo", "hdllo"));
    }

    #[test]
    fn escaped_topics_match_literally() {
        let topic = "odd*[topic]?";
        let pattern = format!("*{}*", escape_glob(topic));
        assert!(glob_matches(&pattern, "odd*[topic]?:list:{}"));
        assert!(!glob_matches(&pattern, "oddXtopicY:list:{}"));
        assert_eq!(escape_glob("a\\b"), "a\\\\b");
    }
}
