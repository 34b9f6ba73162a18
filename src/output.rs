//! Rendering of linking and lookup results for the command line.

use std::fmt::Write as _;

use crate::{entity::Candidate, error::Result, linker::LinkingResult};

/// A plain-text report of one linking result.
pub fn render_human(result: &LinkingResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}): {} linked entities",
        result.document,
        result.language.as_deref().unwrap_or("?"),
        result.linked_entities.len()
    );
    for linked in &result.linked_entities {
        let spans: Vec<String> = linked
            .occurrences
            .iter()
            .map(|o| format!("[{},{})", o.start, o.end))
            .collect();
        let _ = writeln!(
            out,
            "  \"{}\" {} score={:.3}",
            linked.selected_text,
            spans.join(" "),
            linked.score
        );
        for (rank, s) in linked.suggestions.iter().enumerate() {
            let _ = write!(
                out,
                "    {}. {:.3}  {}  {:?} \"{}\"",
                rank + 1,
                s.score,
                s.entity.id,
                s.match_type,
                s.label.text
            );
            if let Some(from) = &s.redirected_from {
                let _ = write!(out, " (via {from})");
            }
            out.push('\n');
        }
        if !linked.dc_types.is_empty() {
            let types: Vec<&str> = linked.dc_types.iter().map(String::as_str).collect();
            let _ = writeln!(out, "    dc:type {}", types.join(", "));
        }
    }
    out
}

pub fn render_json(results: &[LinkingResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// One candidate per line: score, id and the first label.
pub fn render_candidates(candidates: &[Candidate]) -> String {
    let mut out = String::new();
    for c in candidates {
        let label = c.entity.labels.first().map_or("", |l| l.text.as_str());
        let _ = writeln!(out, "{:.3}\t{}\t{}", c.score, c.entity.id, label);
    }
    out
}
