use crate::Span;

/// Source text with a precomputed table of line starts.
#[derive(Clone, Debug)]
pub struct SourceText {
    text: String,
    line_starts: Vec<u32>,
}

impl SourceText {
    pub fn new(text: String) -> Self {
        let mut line_starts = Vec::with_capacity(text.len().saturating_div(64).max(32));
        line_starts.push(0u32);
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { text, line_starts }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn slice(&self, span: Span) -> &str {
        let start = (span.start.0 as usize).min(self.text.len());
        let end = (span.end.0 as usize).clamp(start, self.text.len());
        &self.text[start..end]
    }

    /// Zero-based line and column (in chars) of a byte offset.
    pub fn line_col(&self, byte: u32) -> (u32, u32) {
        let byte = byte.min(self.text.len() as u32);
        let idx = match self.line_starts.binary_search(&byte) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[idx] as usize;
        let mut target = byte as usize;
        while target > line_start && !self.text.is_char_boundary(target) {
            target -= 1;
        }
        let col = self.text[line_start..target].chars().count() as u32;
        (idx as u32, col)
    }
}

#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub text: SourceText,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: SourceText::new(text.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_zero() {
        let text = SourceText::new("var a = 1;\nvar b = a;\n".to_string());
        assert_eq!(text.line_col(0), (0, 0));
        assert_eq!(text.line_col(11), (1, 0));
        assert_eq!(text.line_col(15), (1, 4));
    }

    #[test]
    fn slice_clamps_out_of_range_spans() {
        let text = SourceText::new("abc".to_string());
        assert_eq!(text.slice(Span::new(1, 10)), "bc");
        assert_eq!(text.slice(Span::new(5, 9)), "");
    }
}
