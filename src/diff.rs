//! Hunk parsing for single-file patches as returned by the merge request
//! diff endpoints (no `diff --git` header, hunks only).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("invalid hunk header: {0}")]
    HunkHeader(String),
}

/// A contiguous region of changes within a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// Raw lines of the hunk (prefixed with +, -, or space)
    pub lines: Vec<String>,
}

impl Hunk {
    pub fn additions(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('+')).count()
    }

    pub fn deletions(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('-')).count()
    }
}

/// Split a patch into hunks. Text before the first `@@` header (file headers
/// such as `--- a/x` / `+++ b/x`) is skipped.
pub fn parse_patch(patch: &str) -> Result<Vec<Hunk>, DiffError> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in patch.lines() {
        if line.starts_with("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            let (old_start, old_count, new_start, new_count) = parse_hunk_header(line)?;
            current = Some(Hunk {
                old_start,
                old_count,
                new_start,
                new_count,
                lines: Vec::new(),
            });
            continue;
        }

        if let Some(hunk) = current.as_mut() {
            if line.starts_with('+') || line.starts_with('-') || line.starts_with(' ') {
                hunk.lines.push(line.to_string());
            }
        }
    }

    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }
    Ok(hunks)
}

/// (additions, deletions) of a patch.
pub fn line_stats(patch: &str) -> Result<(usize, usize), DiffError> {
    let hunks = parse_patch(patch)?;
    Ok(hunks
        .iter()
        .fold((0, 0), |(a, d), h| (a + h.additions(), d + h.deletions())))
}

fn parse_hunk_header(line: &str) -> Result<(usize, usize, usize, usize), DiffError> {
    let invalid = || DiffError::HunkHeader(line.to_string());
    let header = line.trim().strip_prefix("@@").ok_or_else(invalid)?;
    // Anything after the closing @@ is section context.
    let header = header.split("@@").next().ok_or_else(invalid)?.trim();
    let mut parts = header.split_whitespace();
    let old_part = parts.next().ok_or_else(invalid)?;
    let new_part = parts.next().ok_or_else(invalid)?;

    let (old_start, old_count) = parse_range(old_part, '-').ok_or_else(invalid)?;
    let (new_start, new_count) = parse_range(new_part, '+').ok_or_else(invalid)?;

    Ok((old_start, old_count, new_start, new_count))
}

fn parse_range(part: &str, prefix: char) -> Option<(usize, usize)> {
    let range = part.strip_prefix(prefix)?;
    let (start, count) = range.split_once(',').unwrap_or((range, "1"));
    Some((start.parse().ok()?, count.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PATCH: &str = "@@ -1,5 +1,7 @@ fn main() {
 fn main() {
-    println!(\"old\");
+    println!(\"new\");
+    // Added a comment
 }
@@ -20 +22,2 @@
-x
+y
+z
\\ No newline at end of file
";

    #[test]
    fn test_parse_hunks() {
        let hunks = parse_patch(SAMPLE_PATCH).unwrap();
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].old_start, 1);
        assert_eq!(hunks[0].new_count, 7);
        assert_eq!(hunks[1].old_count, 1);
        assert_eq!(hunks[1].new_start, 22);
        assert_eq!(hunks[1].lines.len(), 3);
    }

    #[test]
    fn test_line_stats() {
        assert_eq!(line_stats(SAMPLE_PATCH).unwrap(), (4, 2));
    }

    #[test]
    fn test_file_headers_are_skipped() {
        let patch = "--- a/f.txt\n+++ b/f.txt\n@@ -0,0 +1,2 @@\n+hello\n+world\n";
        assert_eq!(line_stats(patch).unwrap(), (2, 0));
    }

    #[test]
    fn test_empty_patch() {
        assert!(parse_patch("").unwrap().is_empty());
        assert_eq!(line_stats("").unwrap(), (0, 0));
    }

    #[test]
    fn test_invalid_header() {
        assert!(matches!(
            parse_patch("@@ nonsense @@\n+x\n"),
            Err(DiffError::HunkHeader(_))
        ));
    }
}
