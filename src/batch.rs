use rayon::prelude::*;
use tracing::warn;

use crate::{
    error::Result,
    linker::{EntityLinker, LinkingResult},
    text::AnalyzedText,
};

/// Link independent documents in parallel. Results come back in input
/// order; a failure of one document does not affect the others.
pub fn link_documents(
    linker: &EntityLinker<'_>,
    documents: &[AnalyzedText],
) -> Vec<Result<LinkingResult>> {
    documents
        .par_iter()
        .map(|doc| {
            let result = linker.link(doc);
            if let Err(e) = &result {
                warn!("linking of '{}' failed: {e}", doc.id);
            }
            result
        })
        .collect()
}
