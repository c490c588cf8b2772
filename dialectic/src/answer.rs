//! `\boxed{...}` answer extraction.

const BOX_MARKER: &str = "\\boxed{";

/// Content of the last `\boxed{...}` in `text`, with nested braces balanced.
///
/// Returns `None` when there is no box, the box is never closed, or it is
/// empty after trimming.
pub fn extract_boxed(text: &str) -> Option<String> {
    let start = text.rfind(BOX_MARKER)? + BOX_MARKER.len();
    let mut depth = 1usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let inner = text[start..start + offset].trim();
                    return (!inner.is_empty()).then(|| inner.to_string());
                }
            }
            _ => {}
        }
    }
    None
}
