//! Documentation indexer.
//!
//! Walks a docs tree, chunks each file (markdown-aware for `.md`,
//! paragraph fallback otherwise), mints deterministic chunk ids, and
//! upserts into the vector store. A docset tag on every payload scopes
//! replace-and-reindex.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use maestro_domain::error::{Error, Result};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::chunker::{chunk_markdown, chunk_text_fallback, Chunk};
use crate::engine::RetrievalEngine;

const INDEXABLE_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexReport {
    pub indexed_files: usize,
    pub indexed_chunks: usize,
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Vec<FilePreview>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FilePreview {
    pub source: String,
    pub chunks: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub docs_root: PathBuf,
    pub docset: String,
    pub max_files: usize,
    pub recreate: bool,
    pub replace_docset: bool,
    pub preview: bool,
    pub preview_files: usize,
    pub preview_chunks_per_file: usize,
    pub preview_chars: usize,
}

pub struct DocIndexer {
    engine: Arc<RetrievalEngine>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocIndexer {
    pub fn new(engine: Arc<RetrievalEngine>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            engine,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Index the tree described by `req`. Preview mode chunks without
    /// touching the store.
    pub async fn index(&self, req: &IndexRequest) -> Result<IndexReport> {
        if !req.docs_root.exists() {
            return Err(Error::Validation(format!(
                "docs_root not found: {}",
                req.docs_root.display()
            )));
        }

        let files = collect_files(&req.docs_root, req.max_files);
        let mut chunks = Vec::new();
        for path in &files {
            let text = std::fs::read_to_string(path).unwrap_or_default();
            if text.trim().is_empty() {
                continue;
            }
            let source = relative_source(&req.docs_root, path);
            chunks.extend(build_chunks(
                &text,
                &source,
                &req.docset,
                self.chunk_size,
                self.chunk_overlap,
            ));
        }

        let preview = req.preview.then(|| {
            preview_of(
                &chunks,
                req.preview_files,
                req.preview_chunks_per_file,
                req.preview_chars,
            )
        });

        let store = self.engine.store();
        if req.preview {
            return Ok(IndexReport {
                indexed_files: files.len(),
                indexed_chunks: chunks.len(),
                collection: store.collection().to_string(),
                preview,
            });
        }

        if req.recreate {
            store.recreate().await?;
        } else if req.replace_docset {
            store
                .delete_by_filter(serde_json::json!({
                    "must": [{ "key": "docset", "match": { "value": req.docset } }]
                }))
                .await?;
        }

        store.upsert(&chunks).await?;
        // Keep the lexical side in step with what was just written.
        self.engine.rebuild_bm25().await?;

        tracing::info!(
            files = files.len(),
            chunks = chunks.len(),
            docset = %req.docset,
            "indexed documentation tree"
        );

        Ok(IndexReport {
            indexed_files: files.len(),
            indexed_chunks: chunks.len(),
            collection: store.collection().to_string(),
            preview,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn collect_files(root: &Path, max_files: usize) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| INDEXABLE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files.truncate(max_files);
    files
}

/// Stable, root-relative paths for citations.
fn relative_source(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Chunk one file and attach deterministic ids and payload metadata.
pub fn build_chunks(
    text: &str,
    source: &str,
    docset: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let is_markdown = source.ends_with(".md") || source.ends_with(".markdown");
    let pieces = if is_markdown {
        chunk_markdown(text, chunk_size, overlap)
    } else {
        chunk_text_fallback(text, chunk_size, overlap)
    };

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| {
            let id = Chunk::stable_id(docset, source, &piece.heading_path, index);
            let mut meta = Map::new();
            meta.insert("docset".into(), Value::String(docset.to_string()));
            meta.insert("chunk_index".into(), Value::Number(index.into()));
            meta.insert(
                "heading_path".into(),
                Value::String(piece.heading_path.clone()),
            );
            Chunk {
                id,
                text: piece.text,
                source: source.to_string(),
                meta,
            }
        })
        .collect()
}

fn preview_of(
    chunks: &[Chunk],
    max_files: usize,
    chunks_per_file: usize,
    max_chars: usize,
) -> Vec<FilePreview> {
    let mut grouped: Vec<FilePreview> = Vec::new();
    for chunk in chunks {
        let idx = match grouped.iter().position(|g| g.source == chunk.source) {
            Some(idx) => idx,
            None => {
                if grouped.len() >= max_files {
                    continue;
                }
                grouped.push(FilePreview {
                    source: chunk.source.clone(),
                    chunks: Vec::new(),
                });
                grouped.len() - 1
            }
        };
        let entry = &mut grouped[idx];
        if entry.chunks.len() < chunks_per_file {
            let mut text: String = chunk.text.chars().take(max_chars).collect();
            if text.len() < chunk.text.len() {
                text.push_str("...");
            }
            entry.chunks.push(text);
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_carry_docset_and_deterministic_ids() {
        let text = "# 제목\n\n본문입니다.\n";
        let a = build_chunks(text, "guide.md", "docs", 900, 0);
        let b = build_chunks(text, "guide.md", "docs", 900, 0);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].id, b[0].id);
        assert_eq!(a[0].meta["docset"], "docs");
        assert_eq!(a[0].meta["heading_path"], "제목");
        assert_eq!(a[0].meta["chunk_index"], 0);
    }

    #[test]
    fn different_docsets_get_different_ids() {
        let text = "내용 문단";
        let a = build_chunks(text, "a.txt", "docs", 900, 0);
        let b = build_chunks(text, "a.txt", "archive", 900, 0);
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn collect_files_filters_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("c.rs"), "fn main() {}").unwrap();

        let all = collect_files(dir.path(), 10);
        assert_eq!(all.len(), 2);
        let bounded = collect_files(dir.path(), 1);
        assert_eq!(bounded.len(), 1);
    }

    #[test]
    fn preview_groups_by_source_and_truncates() {
        let chunks = build_chunks("가나다라마바사아자차\n\n카타파하", "a.txt", "docs", 10, 0);
        let preview = preview_of(&chunks, 5, 5, 4);
        assert_eq!(preview.len(), 1);
        assert!(preview[0].chunks[0].ends_with("..."));
    }
}
