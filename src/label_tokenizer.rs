use tantivy::tokenizer::{TextAnalyzer, TokenStream};

/// Splits labels (and lookup queries) into tokens. The same tokenizer must
/// be used for indexing labels and for querying them.
pub trait LabelTokenizer: Send + Sync {
    fn tokenize(&self, label: &str, language: Option<&str>) -> Vec<String>;
}

/// Splits on every non-alphanumeric character and keeps the case.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleLabelTokenizer;

impl LabelTokenizer for SimpleLabelTokenizer {
    fn tokenize(&self, label: &str, _language: Option<&str>) -> Vec<String> {
        label
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Runs labels through a tantivy analyzer, so queries are normalised the
/// way the index normalises labels.
#[derive(Clone)]
pub struct AnalyzerLabelTokenizer {
    analyzer: TextAnalyzer,
}

impl AnalyzerLabelTokenizer {
    pub fn new(analyzer: TextAnalyzer) -> Self {
        Self { analyzer }
    }
}

impl LabelTokenizer for AnalyzerLabelTokenizer {
    fn tokenize(&self, label: &str, _language: Option<&str>) -> Vec<String> {
        // token_stream needs &mut; analyzers are cheap to clone.
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(label);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }
}

impl std::fmt::Debug for AnalyzerLabelTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerLabelTokenizer").finish_non_exhaustive()
    }
}
