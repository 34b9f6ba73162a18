//! entitylink - links mentions in analysed text to entities of a knowledge
//! base.
//!
//! A document arrives already tokenised, POS tagged and chunked
//! ([`AnalyzedText`]). The [`EntityLinker`] detects spans worth linking,
//! looks up candidate entities by label, optionally follows redirects and
//! ranks the candidates by how well their labels match the text. Entities
//! are kept in a [Tantivy](https://github.com/quickwit-oss/tantivy) label
//! index ([`EntityIndex`]) or, for tests and small vocabularies, in memory
//! ([`InMemorySearcher`]).
//!
//! # Quick start
//!
//! ```no_run
//! use entitylink::{AnalyzedText, ConfigDb, DataDir, EntityIndex, EntityLinker};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config_db = ConfigDb::open(&data_dir.config_db()).unwrap();
//! let index = EntityIndex::open(&data_dir.index_dir().unwrap()).unwrap();
//! let settings = config_db.resolve_settings(None).unwrap();
//!
//! let json = std::fs::read_to_string("document.json").unwrap();
//! let doc = AnalyzedText::from_json(&json).unwrap();
//!
//! let linker = EntityLinker::new(&index, settings)
//!     .unwrap()
//!     .with_tokenizer(index.label_tokenizer());
//! for linked in linker.link(&doc).unwrap().linked_entities {
//!     println!("{} -> {}", linked.selected_text, linked.suggestions[0].entity.id);
//! }
//! ```

pub mod batch;
pub mod config;
pub mod config_db;
pub mod corpus;
pub mod data_dir;
pub mod detector;
pub mod entity;
pub mod error;
pub mod ingestion;
pub mod label_tokenizer;
pub mod language;
pub mod linker;
pub mod lookup;
pub mod output;
pub mod ranker;
pub mod redirect;
pub mod searcher;
pub mod tantivy_index;
pub mod text;
pub mod text_util;
pub mod walker;

pub use config::Settings;
pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use entity::{Candidate, Entity, Label};
pub use error::{Error, Result};
pub use linker::{EntityLinker, LinkingResult};
pub use searcher::{EntitySearcher, InMemorySearcher};
pub use tantivy_index::EntityIndex;
pub use text::AnalyzedText;
