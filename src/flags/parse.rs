use crate::Result;
use crate::flags::set::{FlagSource, LabelSet};
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Interpret a `--flags` value.
///
/// A value naming an existing file is read as a flag file (one label per
/// line); anything else is an inline comma-separated list.
pub fn parse_flags_arg(value: &str) -> Result<LabelSet> {
    let path = Path::new(value);
    if path.is_file() {
        return load_flag_file(path);
    }
    Ok(parse_inline(value))
}

/// Split an inline list on commas. Empty pieces are dropped; pieces are
/// otherwise kept verbatim.
///
/// "Apple,Meta,Google" => ["Apple", "Meta", "Google"]
pub fn parse_inline(value: &str) -> LabelSet {
    let labels = value
        .split(',')
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect();
    LabelSet::new(FlagSource::Inline, labels)
}

/// Read a UTF-8 flag file.
pub fn load_flag_file(path: &Path) -> Result<LabelSet> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read flag file {}", path.display()))?;
    let labels = parse_lines(&text);
    tracing::debug!(path = %path.display(), count = labels.len(), "loaded flag file");
    Ok(LabelSet::new(FlagSource::File(path.to_path_buf()), labels))
}

/// One label per line, surrounding whitespace trimmed, blank lines skipped.
///
/// `\n`, `\r\n` and a lone `\r` all end a line.
pub fn parse_lines(text: &str) -> Vec<String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
