/// Maps byte offsets to 1-based line/column positions.
pub struct SourceMap {
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        SourceMap { line_starts }
    }

    /// Returns (line, col), both 1-based.
    pub fn lookup(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }

    /// Text of a 1-based line without its line terminator.
    pub fn line_text<'a>(&self, source: &'a str, line: usize) -> &'a str {
        let Some(&start) = line.checked_sub(1).and_then(|i| self.line_starts.get(i)) else {
            return "";
        };
        let end = self.line_starts.get(line).copied().unwrap_or(source.len());
        source[start..end].trim_end_matches('\n').trim_end_matches('\r')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_single_line() {
        let map = SourceMap::new("total = a + b");
        assert_eq!(map.lookup(0), (1, 1));
        assert_eq!(map.lookup(8), (1, 9));
    }

    #[test]
    fn lookup_after_newlines() {
        let src = "a = 1\nb = a[0]\n\nprint(b)";
        let map = SourceMap::new(src);
        assert_eq!(map.lookup(5), (1, 6)); // the '\n' itself
        assert_eq!(map.lookup(6), (2, 1));
        assert_eq!(map.lookup(11), (2, 6));
        assert_eq!(map.lookup(16), (4, 1));
    }

    #[test]
    fn line_text_strips_terminators() {
        let src = "a = 1\r\nb = 2\n";
        let map = SourceMap::new(src);
        assert_eq!(map.line_text(src, 1), "a = 1");
        assert_eq!(map.line_text(src, 2), "b = 2");
        assert_eq!(map.line_text(src, 3), "");
    }

    #[test]
    fn line_text_out_of_range() {
        let src = "x";
        let map = SourceMap::new(src);
        assert_eq!(map.line_text(src, 0), "");
        assert_eq!(map.line_text(src, 7), "");
    }
}
