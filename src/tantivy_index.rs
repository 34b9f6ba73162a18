use std::{collections::HashSet, path::Path};

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    collector::{Count, DocSetCollector, TopDocs},
    doc,
    query::{AllQuery, BooleanQuery, Occur, Query, TermQuery},
    schema::*,
    tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer},
};

use crate::{
    entity::{Candidate, Entity},
    error::{Error, Result},
    label_tokenizer::{AnalyzerLabelTokenizer, LabelTokenizer},
    language::base_language,
    searcher::{EntitySearcher, LabelSource},
};

/// Field names used in the schema.
pub mod fields {
    pub const ID: &str = "id";
    pub const LABEL: &str = "label";
    pub const FIELD: &str = "field";
    pub const LANG: &str = "lang";
    pub const ENTITY: &str = "entity";
}

/// Name of the label analyzer registered with the index.
pub const LABEL_TOKENIZER: &str = "label";

/// Language key stored for labels without a language tag.
pub const NO_LANGUAGE: &str = "und";

/// A tantivy index of entity labels. Every label is its own document and
/// carries the serialized entity, so a hit can be dereferenced without a
/// second store.
pub struct EntityIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub id: Field,
    pub label: Field,
    pub field: Field,
    pub lang: Field,
    pub entity: Field,
}

/// Document counts of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub labels: usize,
    pub entities: usize,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::ID, STRING | STORED);

    let label_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(LABEL_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    builder.add_text_field(fields::LABEL, label_opts);

    builder.add_text_field(fields::FIELD, STRING | STORED);
    builder.add_text_field(fields::LANG, STRING | STORED);
    builder.add_text_field(fields::ENTITY, STORED);

    builder.build()
}

fn resolve_fields(schema: &Schema) -> Result<SchemaFields> {
    Ok(SchemaFields {
        id: schema.get_field(fields::ID)?,
        label: schema.get_field(fields::LABEL)?,
        field: schema.get_field(fields::FIELD)?,
        lang: schema.get_field(fields::LANG)?,
        entity: schema.get_field(fields::ENTITY)?,
    })
}

/// The analyzer applied to labels at index time and to queries.
pub fn label_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build()
}

fn register_tokenizers(index: &Index) {
    index.tokenizers().register(LABEL_TOKENIZER, label_analyzer());
}

fn language_key(language: Option<&str>) -> String {
    language
        .map(str::to_lowercase)
        .unwrap_or_else(|| NO_LANGUAGE.to_string())
}

impl EntityIndex {
    /// Open or create an entity index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let schema = build_schema();

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(mmap_dir, schema, tantivy::IndexSettings::default())?
        };

        Self::from_index(index)
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizers(&index);
        let fields = resolve_fields(&index.schema())?;
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    /// A tokenizer that normalises queries like the index normalises labels.
    pub fn label_tokenizer(&self) -> AnalyzerLabelTokenizer {
        AnalyzerLabelTokenizer::new(label_analyzer())
    }

    /// Create a writer with the given memory budget (in bytes).
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget)?)
    }

    /// Add an entity via the given writer, replacing any earlier version.
    pub fn add_entity(&self, writer: &IndexWriter, entity: &Entity) -> Result<()> {
        let f = self.fields;
        self.delete_entity(writer, &entity.id);

        let json = serde_json::to_string(entity)?;
        if entity.labels.is_empty() {
            // Keep unlabelled entities addressable by id.
            writer.add_document(doc!(
                f.id => entity.id.as_str(),
                f.lang => NO_LANGUAGE,
                f.entity => json,
            ))?;
            return Ok(());
        }

        for label in &entity.labels {
            writer.add_document(doc!(
                f.id => entity.id.as_str(),
                f.label => label.text.as_str(),
                f.field => label.field.as_str(),
                f.lang => language_key(label.language.as_deref()),
                f.entity => json.as_str(),
            ))?;
        }
        Ok(())
    }

    pub fn delete_entity(&self, writer: &IndexWriter, id: &str) {
        writer.delete_term(Term::from_field_text(self.fields.id, id));
    }

    /// Remove every document from the index.
    pub fn clear(&self, writer: &mut IndexWriter) -> Result<()> {
        writer.delete_all_documents()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let labels = searcher.search(&AllQuery, &Count)?;

        let addresses = searcher.search(&AllQuery, &DocSetCollector)?;
        let mut ids = HashSet::new();
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            ids.insert(extract_text(&doc, self.fields.id));
        }

        Ok(IndexStats {
            labels,
            entities: ids.len(),
        })
    }

    fn language_query(&self, language: &str) -> Box<dyn Query> {
        let lang = language.to_lowercase();
        let mut keys = vec![lang.clone(), NO_LANGUAGE.to_string()];
        let base = base_language(&lang);
        if base != lang {
            keys.push(base.to_string());
        }
        let clauses = keys
            .into_iter()
            .map(|key| {
                let q: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.lang, &key),
                    IndexRecordOption::Basic,
                ));
                (Occur::Should, q)
            })
            .collect();
        Box::new(BooleanQuery::new(clauses))
    }

    fn search_labels(
        &self,
        tokens: &[String],
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let f = self.fields;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let analyzer = self.label_tokenizer();
        let mut terms: Vec<String> = tokens
            .iter()
            .flat_map(|t| analyzer.tokenize(t, language))
            .collect();
        terms.sort_unstable();
        terms.dedup();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let label_clauses = terms
            .iter()
            .map(|term| {
                let q: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(f.label, term),
                    IndexRecordOption::WithFreqs,
                ));
                (Occur::Should, q)
            })
            .collect();
        let label_query: Box<dyn Query> =
            Box::new(BooleanQuery::new(label_clauses));

        let query: Box<dyn Query> = match language {
            Some(lang) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, label_query),
                (Occur::Must, self.language_query(lang)),
            ])),
            None => label_query,
        };

        self.reader.reload()?;
        let searcher = self.reader.searcher();
        // Several labels of one entity may hit; over-fetch before dedup.
        let top_docs = searcher
            .search(&*query, &TopDocs::with_limit(limit.saturating_mul(4)))?;

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(limit);
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = extract_text(&doc, f.id);
            if !seen.insert(id) {
                continue;
            }
            results.push(Candidate {
                entity: parse_entity(&doc, f.entity)?,
                score,
            });
            if results.len() == limit {
                break;
            }
        }
        Ok(results)
    }

    fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let f = self.fields;
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(f.id, id),
            IndexRecordOption::Basic,
        );
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.first() {
            Some((_, address)) => {
                let doc: TantivyDocument = searcher.doc(*address)?;
                Ok(Some(parse_entity(&doc, f.entity)?))
            }
            None => Ok(None),
        }
    }

    fn collect_labels(
        &self,
        field: &str,
        language: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        let f = self.fields;
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let field_query: Box<dyn Query> = Box::new(TermQuery::new(
            Term::from_field_text(f.field, field),
            IndexRecordOption::Basic,
        ));
        let lang_query: Box<dyn Query> = Box::new(TermQuery::new(
            Term::from_field_text(f.lang, &language_key(language)),
            IndexRecordOption::Basic,
        ));
        let query = BooleanQuery::new(vec![
            (Occur::Must, field_query),
            (Occur::Must, lang_query),
        ]);

        let mut addresses: Vec<_> =
            searcher.search(&query, &DocSetCollector)?.into_iter().collect();
        addresses.sort();

        let mut labels = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            let label = extract_text(&doc, f.label);
            if !label.is_empty() {
                labels.push((extract_text(&doc, f.id), label));
            }
        }
        Ok(labels)
    }
}

fn as_lookup_error(e: Error) -> Error {
    match e {
        Error::Lookup { .. } => e,
        other => Error::lookup(other),
    }
}

impl EntitySearcher for EntityIndex {
    fn find_by_label(
        &self,
        tokens: &[String],
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        self.search_labels(tokens, language, limit)
            .map_err(as_lookup_error)
    }

    fn get(&self, id: &str) -> Result<Option<Entity>> {
        self.get_entity(id).map_err(as_lookup_error)
    }
}

impl LabelSource for EntityIndex {
    fn labels(
        &self,
        field: &str,
        language: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        self.collect_labels(field, language).map_err(as_lookup_error)
    }
}

impl std::fmt::Debug for EntityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityIndex").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn parse_entity(doc: &TantivyDocument, field: Field) -> Result<Entity> {
    serde_json::from_str(&extract_text(doc, field))
        .map_err(|e| Error::lookup(format!("corrupt stored entity: {e}")))
}
