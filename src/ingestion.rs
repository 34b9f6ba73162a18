use std::path::Path;

use rayon::prelude::*;
use tantivy::IndexWriter;
use tracing::{info, warn};

use crate::{
    entity::Entity,
    error::Result,
    tantivy_index::EntityIndex,
    text::AnalyzedText,
    walker::DiscoveredFile,
};

/// Counts of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files: usize,
    pub entities: usize,
    /// Lines or files that could not be parsed.
    pub skipped: usize,
}

/// Parse an entity dump. A content starting with `[` is a JSON array,
/// anything else is read as one entity per line. Unparseable entries are
/// logged and counted.
pub fn parse_entities(content: &str, source: &Path) -> (Vec<Entity>, usize) {
    if content.trim_start().starts_with('[') {
        return match serde_json::from_str::<Vec<Entity>>(content) {
            Ok(entities) => (
                entities
                    .into_iter()
                    .map(|e| clamp_ranking(e, source))
                    .collect(),
                0,
            ),
            Err(e) => {
                warn!("skipping {}: {e}", source.display());
                (Vec::new(), 1)
            }
        };
    }

    let mut entities = Vec::new();
    let mut skipped = 0;
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Entity>(line) {
            Ok(entity) => entities.push(clamp_ranking(entity, source)),
            Err(e) => {
                warn!("skipping {}:{}: {e}", source.display(), n + 1);
                skipped += 1;
            }
        }
    }
    (entities, skipped)
}

/// Rankings are popularities in `[0, 1]`; others are clamped.
fn clamp_ranking(mut entity: Entity, source: &Path) -> Entity {
    if let Some(ranking) = entity.ranking
        && !(0.0..=1.0).contains(&ranking)
    {
        warn!(
            "{}: ranking {ranking} of {} is outside [0, 1], clamping",
            source.display(),
            entity.id
        );
        entity.ranking = Some(ranking.clamp(0.0, 1.0));
    }
    entity
}

/// Load entity dumps and add them to the index. Entities already in the
/// index are replaced. Commits once at the end.
pub fn ingest_files(
    index: &EntityIndex,
    writer: &mut IndexWriter,
    files: &[DiscoveredFile],
) -> Result<IngestStats> {
    // Parse in parallel, then index sequentially through the single writer.
    let loaded: Vec<(Vec<Entity>, usize)> = files
        .par_iter()
        .filter_map(|file| match std::fs::read_to_string(&file.absolute_path) {
            Ok(content) => Some(parse_entities(&content, &file.relative_path)),
            Err(e) => {
                warn!("cannot read {}: {e}", file.absolute_path.display());
                None
            }
        })
        .collect();

    let mut stats = IngestStats {
        files: loaded.len(),
        ..IngestStats::default()
    };
    for (entities, skipped) in &loaded {
        stats.skipped += skipped;
        for entity in entities {
            index.add_entity(writer, entity)?;
            stats.entities += 1;
        }
    }

    writer.commit()?;
    info!(
        "indexed {} entities from {} files ({} skipped)",
        stats.entities, stats.files, stats.skipped
    );
    Ok(stats)
}

/// Load analysed documents in parallel. Files that cannot be read or do not
/// hold a valid document are logged and left out.
pub fn load_documents(files: &[DiscoveredFile]) -> Vec<AnalyzedText> {
    files
        .par_iter()
        .filter_map(|file| {
            let loaded = std::fs::read_to_string(&file.absolute_path)
                .map_err(crate::Error::from)
                .and_then(|json| AnalyzedText::from_json(&json));
            match loaded {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!("skipping document {}: {e}", file.relative_path.display());
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::EntitySearcher;

    #[test]
    fn parses_lines_and_skips_garbage() {
        let content = r#"{"id": "urn:a", "labels": [{"text": "Alpha"}]}

not json
{"id": "urn:b"}
"#;
        let (entities, skipped) = parse_entities(content, Path::new("dump.jsonl"));
        assert_eq!(entities.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(entities[1].id, "urn:b");
    }

    #[test]
    fn rankings_are_clamped_to_unit_range() {
        let content = concat!(
            r#"{"id": "urn:a", "ranking": 5.0}"#,
            "\n",
            r#"{"id": "urn:b", "ranking": -0.5}"#,
            "\n",
            r#"{"id": "urn:c", "ranking": 0.25}"#,
            "\n",
        );
        let (entities, skipped) = parse_entities(content, Path::new("dump.jsonl"));
        assert_eq!(skipped, 0);
        let rankings: Vec<_> = entities.iter().map(|e| e.ranking).collect();
        assert_eq!(rankings, vec![Some(1.0), Some(0.0), Some(0.25)]);

        let (entities, _) =
            parse_entities(r#"[{"id": "urn:a", "ranking": 2}]"#, Path::new("dump.json"));
        assert_eq!(entities[0].ranking, Some(1.0));
    }

    #[test]
    fn parses_arrays() {
        let content = r#"[{"id": "urn:a"}, {"id": "urn:b", "redirect": "urn:a"}]"#;
        let (entities, skipped) = parse_entities(content, Path::new("dump.json"));
        assert_eq!(skipped, 0);
        assert_eq!(entities[1].redirect.as_deref(), Some("urn:a"));

        let (entities, skipped) = parse_entities("[{", Path::new("bad.json"));
        assert!(entities.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn ingest_and_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("places.jsonl"),
            concat!(
                r#"{"id": "urn:nz", "labels": [{"text": "New Zealand", "language": "en"}]}"#,
                "\n",
                r#"{"id": "urn:otago", "labels": [{"text": "Otago"}]}"#,
                "\n",
            ),
        )
        .unwrap();

        let files = crate::walker::discover_files(tmp.path(), crate::walker::ENTITY_EXTENSIONS)
            .unwrap();
        let index = EntityIndex::open_in_ram().unwrap();
        let mut writer = index.writer(15_000_000).unwrap();
        let stats = ingest_files(&index, &mut writer, &files).unwrap();
        assert_eq!(
            stats,
            IngestStats {
                files: 1,
                entities: 2,
                skipped: 0
            }
        );

        let found = index
            .find_by_label(&["zealand".to_string()], Some("en"), 10)
            .unwrap();
        assert_eq!(found[0].entity.id, "urn:nz");
    }

    #[test]
    fn reingest_replaces_entities() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("e.jsonl");
        std::fs::write(&path, r#"{"id": "urn:x", "labels": [{"text": "Dunedin"}]}"#).unwrap();

        let index = EntityIndex::open_in_ram().unwrap();
        let mut writer = index.writer(15_000_000).unwrap();
        let files = crate::walker::discover_files(&path, crate::walker::ENTITY_EXTENSIONS).unwrap();
        ingest_files(&index, &mut writer, &files).unwrap();

        std::fs::write(&path, r#"{"id": "urn:x", "labels": [{"text": "Otepoti"}]}"#).unwrap();
        ingest_files(&index, &mut writer, &files).unwrap();

        assert_eq!(index.stats().unwrap().entities, 1);
        assert!(index.find_by_label(&["dunedin".to_string()], None, 10).unwrap().is_empty());
        assert_eq!(
            index.find_by_label(&["otepoti".to_string()], None, 10).unwrap().len(),
            1
        );
    }

    #[test]
    fn loads_valid_documents_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("good.json"),
            r#"{"id": "d1", "text": "Otago", "tokens": [{"start": 0, "end": 5}]}"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("bad.json"),
            r#"{"id": "d2", "text": "Otago", "tokens": [{"start": 0, "end": 50}]}"#,
        )
        .unwrap();

        let files =
            crate::walker::discover_files(tmp.path(), crate::walker::DOCUMENT_EXTENSIONS).unwrap();
        let docs = load_documents(&files);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "d1");
    }
}
