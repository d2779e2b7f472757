//! Character-boundary-safe slicing helpers.

/// The first `n` characters of `s`.
pub fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The last `n` characters of `s`.
pub fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let skip = count - n;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_and_tail_respect_char_boundaries() {
        let s = "héllo wörld";
        assert_eq!(head_chars(s, 2), "hé");
        assert_eq!(tail_chars(s, 4), "örld");
        assert_eq!(head_chars(s, 100), s);
        assert_eq!(tail_chars(s, 100), s);
        assert_eq!(head_chars(s, 0), "");
        assert_eq!(tail_chars(s, 0), "");
    }
}
