/// Default word delimiters of every definition, in sorted order.
pub const DEFAULT_WORD_DELIMITERS: &str = "\t !%&()*+,-./:;<=>?[\\]^{|}~";

/// A sorted, duplicate-free set of delimiter characters.
///
/// Lookups use binary search, so every mutation re-establishes the ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordDelimiters {
    chars: Vec<char>,
}

impl Default for WordDelimiters {
    fn default() -> Self {
        Self::from_chars(DEFAULT_WORD_DELIMITERS)
    }
}

impl WordDelimiters {
    /// Build a delimiter set from arbitrary characters.
    pub fn from_chars(chars: &str) -> Self {
        let mut out = Self { chars: Vec::new() };
        out.add(chars);
        out
    }

    /// Returns `true` if `c` is a delimiter.
    pub fn contains(&self, c: char) -> bool {
        self.chars.binary_search(&c).is_ok()
    }

    /// Add delimiters.
    pub fn add(&mut self, chars: &str) {
        self.chars.extend(chars.chars());
        self.chars.sort_unstable();
        self.chars.dedup();
    }

    /// Remove delimiters.
    pub fn remove(&mut self, chars: &str) {
        self.chars.retain(|c| !chars.contains(*c));
    }

    /// The delimiters in ascending order.
    pub fn as_slice(&self) -> &[char] {
        &self.chars
    }

    /// Number of delimiters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Returns `true` if there are no delimiters.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_sorted_unique(d: &WordDelimiters) -> bool {
        d.as_slice().windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn test_default_set_is_exact() {
        let d = WordDelimiters::default();
        let s: String = d.as_slice().iter().collect();
        assert_eq!(s, DEFAULT_WORD_DELIMITERS);
        assert!(is_sorted_unique(&d));
    }

    #[test]
    fn test_add_then_remove_keeps_order() {
        let mut d = WordDelimiters::default();
        d.add("#$@!!");
        assert!(is_sorted_unique(&d));
        assert!(d.contains('#'));
        assert!(d.contains('@'));

        d.remove(".-#");
        assert!(is_sorted_unique(&d));
        assert!(!d.contains('.'));
        assert!(!d.contains('-'));
        assert!(!d.contains('#'));
        assert!(d.contains('$'));

        d.add("..");
        assert!(is_sorted_unique(&d));
        assert!(d.contains('.'));
    }

    #[test]
    fn test_non_ascii_delimiters() {
        let mut d = WordDelimiters::default();
        d.add("«»");
        assert!(is_sorted_unique(&d));
        assert!(d.contains('»'));
        assert!(!d.contains('a'));
    }
}
