//! Prompt rendering and audit hashing.
//!
//! The user message for a task is its referenced documents, each wrapped
//! in explicit fences, followed by the prompt body. Document and prompt
//! SHA-256 checksums go into `run_meta.json` so a published run can be
//! audited against the exact inputs.

use std::collections::BTreeMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::catalog::Task;

/// Load one referenced document as text.
///
/// PDF extraction is out of scope here: a `.pdf` reference is served from
/// a pre-extracted `extracts/<stem>.txt` when present. A missing document
/// renders an explicit placeholder so the gap is visible in the archived
/// prompt rather than silently shortening it.
pub fn load_document(docs_dir: &Path, filename: &str) -> String {
    let path = docs_dir.join(filename);

    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) {
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        let extract = docs_dir.join("extracts").join(format!("{stem}.txt"));
        match std::fs::read_to_string(&extract) {
            Ok(text) => return text,
            Err(_) => {
                warn!(document = filename, extract = %extract.display(), "no text extract for pdf");
                return format!("[DOCUMENT NOT FOUND: {filename}]");
            }
        }
    }

    match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(_) => {
            warn!(document = %path.display(), "document not found");
            format!("[DOCUMENT NOT FOUND: {filename}]")
        }
    }
}

/// Render the full user message: embedded documents, then the prompt.
pub fn build_user_content(task: &Task, docs_dir: &Path) -> String {
    let mut parts = Vec::with_capacity(task.docs.len() + 1);
    for doc in &task.docs {
        let text = load_document(docs_dir, doc);
        parts.push(format!(
            "--- DOCUMENT: {doc} ---\n\n{text}\n\n--- END DOCUMENT ---"
        ));
    }
    parts.push(task.prompt.clone());
    parts.join("\n\n")
}

/// SHA-256 of a string, hex-encoded.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checksums of every on-disk document the tasks reference.
/// Missing documents are skipped — the dispatch log already warns.
pub fn document_checksums(tasks: &[Task], docs_dir: &Path) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for task in tasks {
        for doc in &task.docs {
            if out.contains_key(doc) {
                continue;
            }
            let path = docs_dir.join(doc);
            if let Ok(bytes) = std::fs::read(&path) {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                out.insert(doc.clone(), hex::encode(hasher.finalize()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Variant;

    fn task(docs: Vec<String>, prompt: &str) -> Task {
        Task {
            id: "T1_test_n".into(),
            title: "Test".into(),
            variant: Variant::Normal,
            category: "test".into(),
            docs,
            measures: vec![],
            use_system_prompt: false,
            prompt: prompt.into(),
        }
    }

    #[test]
    fn sha256_known_vector() {
        // Matches `echo -n abc | sha256sum`.
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn docless_task_renders_prompt_only() {
        let t = task(vec![], "Just the question.");
        let content = build_user_content(&t, Path::new("/nonexistent"));
        assert_eq!(content, "Just the question.");
    }

    #[test]
    fn missing_document_renders_placeholder() {
        let t = task(vec!["ghost.txt".into()], "Question.");
        let content = build_user_content(&t, Path::new("/nonexistent"));
        assert!(content.contains("[DOCUMENT NOT FOUND: ghost.txt]"));
        assert!(content.contains("--- DOCUMENT: ghost.txt ---"));
        assert!(content.ends_with("Question."));
    }

    #[test]
    fn document_embedded_between_fences() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.txt"), "report body").unwrap();
        let t = task(vec!["report.txt".into()], "Summarize.");
        let content = build_user_content(&t, dir.path());
        let doc_pos = content.find("report body").unwrap();
        let end_pos = content.find("--- END DOCUMENT ---").unwrap();
        let prompt_pos = content.find("Summarize.").unwrap();
        assert!(doc_pos < end_pos && end_pos < prompt_pos);
    }

    #[test]
    fn pdf_reference_uses_extract_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("extracts")).unwrap();
        std::fs::write(dir.path().join("extracts/radar.txt"), "extracted text").unwrap();
        assert_eq!(load_document(dir.path(), "radar.pdf"), "extracted text");
    }

    #[test]
    fn checksums_skip_missing_and_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        let tasks = vec![
            task(vec!["a.txt".into(), "missing.txt".into()], "p"),
            task(vec!["a.txt".into()], "q"),
        ];
        let sums = document_checksums(&tasks, dir.path());
        assert_eq!(sums.len(), 1);
        assert!(sums.contains_key("a.txt"));
    }
}
