//! Filename conventions used across discovery, output publication, and
//! force-reprocess (spec.md §4.2, §4.4, §4.6 step 6).

use std::path::Path;

/// `<base>` of `out/<base>__job-<jobKey>.pdf`: the input filename with its
/// extension stripped.
pub fn output_base(input_name: &str) -> &str {
    Path::new(input_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(input_name)
}

/// `_staging/<ts>_<name>` staging filename.
pub fn staging_name(ts: &str, name: &str) -> String {
    format!("{ts}_{name}")
}

/// `<ts>__<origName>` filename used when quarantining a duplicate into
/// `hold/duplicates/<jobKey>/`.
pub fn duplicate_hold_name(ts: &str, orig_name: &str) -> String {
    format!("{ts}__{orig_name}")
}

/// `<stem>__force-<nonce[:8]>.<ext>` suffix applied when a `FORCE_REPROCESS`
/// decision re-injects a held duplicate back into `in/` (spec.md §4.4).
pub fn force_reprocess_name(orig_name: &str, nonce: &str) -> String {
    let short_nonce: String = nonce.chars().take(8).collect();
    let path = Path::new(orig_name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|s| s.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{stem}__force-{short_nonce}.{ext}"),
        (Some(stem), None) => format!("{stem}__force-{short_nonce}"),
        _ => format!("{orig_name}__force-{short_nonce}"),
    }
}

/// Whether a filename should be observed by discovery: `.cbz`/`.cbr`
/// extension (case-insensitive), excluding `.part` and other partial names
/// (spec.md §4.6 step 2, §6 watch-folder contract).
pub fn is_archive_candidate(name: &str) -> bool {
    if name.ends_with(".part") {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".cbz") || lower.ends_with(".cbr")
}
