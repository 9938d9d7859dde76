//! Whitespace tokenizer for the line-oriented configuration formats.

/// One tokenized configuration line.
#[derive(Debug, Clone)]
pub struct LineLexer<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> LineLexer<'a> {
    /// Tokenize a line on whitespace.
    pub fn new(line: &'a str) -> Self {
        Self {
            tokens: line.split_whitespace().collect(),
        }
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True for a blank line.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The token at `idx`, if present.
    pub fn token(&self, idx: usize) -> Option<&'a str> {
        self.tokens.get(idx).copied()
    }

    /// True if the token at `idx` equals `word`.
    pub fn word_match(&self, word: &str, idx: usize) -> bool {
        self.token(idx) == Some(word)
    }

    /// The token at `idx` parsed as a float.
    pub fn token_f64(&self, idx: usize) -> Option<f64> {
        self.token(idx)?.parse().ok()
    }

    /// The token at `idx` parsed as an integer.
    pub fn token_i64(&self, idx: usize) -> Option<i64> {
        self.token(idx)?.parse().ok()
    }

    /// Three consecutive floats starting at `idx`.
    pub fn token_triple(&self, idx: usize) -> Option<[f64; 3]> {
        Some([
            self.token_f64(idx)?,
            self.token_f64(idx + 1)?,
            self.token_f64(idx + 2)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let lex = LineLexer::new("OCTREE_CENTER 1.0  -2.5\t3");
        assert_eq!(lex.len(), 4);
        assert!(lex.word_match("OCTREE_CENTER", 0));
        assert_eq!(lex.token_triple(1), Some([1.0, -2.5, 3.0]));
    }

    #[test]
    fn test_missing_and_bad_tokens() {
        let lex = LineLexer::new("SCF abc");
        assert_eq!(lex.token_f64(1), None);
        assert_eq!(lex.token(2), None);
        assert_eq!(lex.token_triple(1), None);
        assert!(LineLexer::new("   ").is_empty());
    }

    #[test]
    fn test_integer_tokens() {
        let lex = LineLexer::new("OCTREE_MAX_DEPTH 7");
        assert_eq!(lex.token_i64(1), Some(7));
        assert_eq!(LineLexer::new("X 1.5").token_i64(1), None);
    }
}
