use similar::{capture_diff_slices, Algorithm, DiffTag};

/// Minimum character-level similarity before a replaced line pair is shown
/// as an annotated `-`/`+` pair instead of a plain delete and insert.
const SYNCH_RATIO: f64 = 0.75;

// ---------------------------------------------------------------------------
// Line diff
// ---------------------------------------------------------------------------

/// Myers line diff with the classic four-way prefix convention:
/// `"  "` common, `"- "` only in primary, `"+ "` only in shadow, and `"? "`
/// for intraline hint lines (`^` changed, `-` deleted, `+` inserted).
pub(crate) fn diff_lines(primary: &[String], shadow: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, primary, shadow) {
        match op.tag() {
            DiffTag::Equal => {
                for line in &primary[op.old_range()] {
                    out.push(format!("  {line}"));
                }
            }
            DiffTag::Delete => {
                for line in &primary[op.old_range()] {
                    out.push(format!("- {line}"));
                }
            }
            DiffTag::Insert => {
                for line in &shadow[op.new_range()] {
                    out.push(format!("+ {line}"));
                }
            }
            DiffTag::Replace => {
                replace_block(&primary[op.old_range()], &shadow[op.new_range()], &mut out);
            }
        }
    }
    out
}

/// Render a replaced block, pairing lines index-wise. A pair similar enough
/// gets intraline hints; dissimilar pairs fall back to a plain delete and
/// insert.
fn replace_block(old: &[String], new: &[String], out: &mut Vec<String>) {
    let paired = old.len().min(new.len());
    for i in 0..paired {
        let (old_tags, new_tags, ratio) = intraline_tags(&old[i], &new[i]);
        if ratio >= SYNCH_RATIO {
            out.push(format!("- {}", old[i]));
            if !old_tags.is_empty() {
                out.push(format!("? {old_tags}"));
            }
            out.push(format!("+ {}", new[i]));
            if !new_tags.is_empty() {
                out.push(format!("? {new_tags}"));
            }
        } else {
            out.push(format!("- {}", old[i]));
            out.push(format!("+ {}", new[i]));
        }
    }
    for line in &old[paired..] {
        out.push(format!("- {line}"));
    }
    for line in &new[paired..] {
        out.push(format!("+ {line}"));
    }
}

/// Character-level hint strings for a replaced line pair, plus the
/// similarity ratio (2 * matches / total characters).
fn intraline_tags(old: &str, new: &str) -> (String, String, f64) {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let total = old_chars.len() + new_chars.len();
    if total == 0 {
        return (String::new(), String::new(), 1.0);
    }

    let mut old_tags = String::new();
    let mut new_tags = String::new();
    let mut matches = 0usize;
    for op in capture_diff_slices(Algorithm::Myers, &old_chars, &new_chars) {
        let old_len = op.old_range().len();
        let new_len = op.new_range().len();
        match op.tag() {
            DiffTag::Equal => {
                matches += old_len;
                old_tags.extend(std::iter::repeat(' ').take(old_len));
                new_tags.extend(std::iter::repeat(' ').take(new_len));
            }
            DiffTag::Delete => old_tags.extend(std::iter::repeat('-').take(old_len)),
            DiffTag::Insert => new_tags.extend(std::iter::repeat('+').take(new_len)),
            DiffTag::Replace => {
                old_tags.extend(std::iter::repeat('^').take(old_len));
                new_tags.extend(std::iter::repeat('^').take(new_len));
            }
        }
    }

    let ratio = 2.0 * matches as f64 / total as f64;
    (
        old_tags.trim_end().to_string(),
        new_tags.trim_end().to_string(),
        ratio,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
