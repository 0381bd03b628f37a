/// Compares contestant output to the expected output for Batch and
/// OutputOnly task types (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Exact,
    WhitespaceNormalized,
}

impl Comparator {
    pub fn compare(&self, actual: &[u8], expected: &[u8]) -> bool {
        match self {
            Comparator::Exact => actual == expected,
            Comparator::WhitespaceNormalized => normalize(actual) == normalize(expected),
        }
    }
}

/// Token-by-token view of `bytes` split on ASCII whitespace, empty runs
/// collapsed, so repeated spaces/newlines don't affect comparison.
fn normalize(bytes: &[u8]) -> Vec<&[u8]> {
    bytes
        .split(|b| b.is_ascii_whitespace())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_normalized_ignores_spacing_differences() {
        let cmp = Comparator::WhitespaceNormalized;
        assert!(cmp.compare(b"1 2 3\n", b"1  2   3\n\n"));
        assert!(!cmp.compare(b"1 2 3", b"1 2 4"));
    }

    #[test]
    fn exact_requires_byte_equality() {
        let cmp = Comparator::Exact;
        assert!(!cmp.compare(b"1 2 3\n", b"1 2 3"));
        assert!(cmp.compare(b"1 2 3\n", b"1 2 3\n"));
    }
}
