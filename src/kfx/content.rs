//! Text content accumulation.
//!
//! Paragraph text is stored out-of-line in named content fragments;
//! content entries point at `(fragment_name, item_offset)`. Fragments are
//! size-bounded: when the next append would push a fragment past the
//! limit, the fragment closes and a new one starts. Closed fragments are
//! immutable.

/// Maximum total byte length of one content fragment's text items.
pub const MAX_CONTENT_FRAGMENT_SIZE: usize = 8192;

/// Accumulates text items into `content_N` fragments.
#[derive(Debug)]
pub struct ContentAccumulator {
    closed: Vec<(String, Vec<String>)>,
    current: Vec<String>,
    current_bytes: usize,
    index: usize,
}

impl Default for ContentAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentAccumulator {
    pub fn new() -> Self {
        Self {
            closed: Vec::new(),
            current: Vec::new(),
            current_bytes: 0,
            index: 1,
        }
    }

    /// Name of the fragment the next append lands in (assuming it fits).
    pub fn current_name(&self) -> String {
        format!("content_{}", self.index)
    }

    /// Append one text item, returning its `(fragment_name, offset)`.
    ///
    /// An item larger than the limit still lands somewhere: it gets a
    /// fragment of its own, since a text item maps to exactly one content
    /// entry and cannot be split.
    pub fn append(&mut self, text: String) -> (String, usize) {
        if !self.current.is_empty() && self.current_bytes + text.len() > MAX_CONTENT_FRAGMENT_SIZE {
            self.close_current();
        }
        let name = self.current_name();
        let offset = self.current.len();
        self.current_bytes += text.len();
        self.current.push(text);
        (name, offset)
    }

    fn close_current(&mut self) {
        let name = self.current_name();
        self.closed.push((name, std::mem::take(&mut self.current)));
        self.current_bytes = 0;
        self.index += 1;
    }

    /// Close the open fragment and return all fragments in order.
    pub fn finish(mut self) -> Vec<(String, Vec<String>)> {
        if !self.current.is_empty() {
            self.close_current();
        }
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_name_and_offset() {
        let mut acc = ContentAccumulator::new();
        assert_eq!(acc.append("alpha".into()), ("content_1".to_string(), 0));
        assert_eq!(acc.append("beta".into()), ("content_1".to_string(), 1));
        let fragments = acc.finish();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].1, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_chunking_closes_at_limit() {
        let mut acc = ContentAccumulator::new();
        // 81 items of 100 bytes = 8100 bytes in content_1.
        for _ in 0..81 {
            let (name, _) = acc.append("x".repeat(100));
            assert_eq!(name, "content_1");
        }
        // A 200-byte item would exceed 8192; it opens content_2 at offset 0.
        let (name, offset) = acc.append("y".repeat(200));
        assert_eq!(name, "content_2");
        assert_eq!(offset, 0);

        let fragments = acc.finish();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].0, "content_1");
        assert_eq!(fragments[0].1.len(), 81);
        assert_eq!(fragments[1].0, "content_2");
        assert_eq!(fragments[1].1.len(), 1);
    }

    #[test]
    fn test_exact_fit_does_not_split() {
        let mut acc = ContentAccumulator::new();
        acc.append("x".repeat(8000));
        let (name, _) = acc.append("y".repeat(192));
        assert_eq!(name, "content_1");
        let (name, _) = acc.append("z".into());
        assert_eq!(name, "content_2");
    }

    #[test]
    fn test_oversize_item_gets_own_fragment() {
        let mut acc = ContentAccumulator::new();
        acc.append("a".into());
        let (name, offset) = acc.append("x".repeat(MAX_CONTENT_FRAGMENT_SIZE + 1));
        assert_eq!(name, "content_2");
        assert_eq!(offset, 0);
        let (name, _) = acc.append("b".into());
        assert_eq!(name, "content_3");
    }

    #[test]
    fn test_rune_content_counts_bytes_not_chars() {
        let mut acc = ContentAccumulator::new();
        // Cyrillic characters are 2 bytes each in UTF-8.
        let item = "ж".repeat(2000); // 4000 bytes
        acc.append(item.clone());
        acc.append(item.clone());
        let (name, _) = acc.append(item);
        assert_eq!(name, "content_2");
    }
}
