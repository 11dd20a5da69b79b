//! Flat frame list → nested call-tree document.
//!
//! A completed root trace arrives as frames in entry order, each annotated
//! with the 1-based depth recorded when it was entered. The encoder rebuilds
//! the tree in a single pass by comparing each frame's depth with the next
//! one's, balancing brackets as it goes instead of materializing a tree —
//! the grammar per document is
//! `{"<label>":"<float>ms"[,"subcalls":[{...},{...}]]}`.
//!
//! Between surviving frames the depth rises by at most one: a child's
//! interval nests inside its parent's, so a dropped parent always implies
//! dropped children.

use crate::recorder::Frame;

/// Encode one completed frame list. Returns `None` when the list is empty
/// after filtering; the caller must not write in that case.
#[must_use]
pub fn encode(frames: &[Frame]) -> Option<String> {
    if frames.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(frames.len() * 48);
    out.push('{');
    for (i, frame) in frames.iter().enumerate() {
        out.push('"');
        out.push_str(&render_label(&frame.label, frame.params.as_deref()));
        out.push_str("\":\"");
        out.push_str(&frame.duration.to_string());
        out.push('"');
        match frames.get(i + 1).map(|next| next.depth) {
            // Last frame: unwind fully back to depth 1.
            None => {
                for _ in 1..frame.depth {
                    out.push_str("}]");
                }
            }
            // Next frame is a child: open one nested grouping.
            Some(next) if next == frame.depth + 1 => out.push_str(",\"subcalls\":[{"),
            // Sibling at the same level.
            Some(next) if next == frame.depth => out.push_str("},{"),
            // Return to an ancestor level: close the difference, then open
            // a sibling object there.
            Some(next) => {
                for _ in next..frame.depth {
                    out.push_str("}]");
                }
                out.push_str("},{");
            }
        }
    }
    out.push('}');
    Some(out)
}

/// Render the frame label. With a parameter snapshot the positional values
/// are substituted into the declared slots parsed from the signature and the
/// result is escaped; without one the signature passes through untouched.
fn render_label(signature: &str, params: Option<&[String]>) -> String {
    let Some(values) = params.filter(|values| !values.is_empty()) else {
        return signature.to_string();
    };
    let (Some(open), Some(close)) = (signature.find('('), signature.rfind(')')) else {
        // No declared slots to substitute into; keep the signature.
        return escape(signature);
    };
    if close < open {
        return escape(signature);
    }
    let inner = &signature[open + 1..close];
    let declared: Vec<&str> = if inner.is_empty() {
        Vec::new()
    } else {
        inner.split(',').collect()
    };

    let mut rendered = String::with_capacity(signature.len() + 16);
    rendered.push_str(&signature[..open]);
    rendered.push('(');
    let slots = declared.len().max(values.len());
    for i in 0..slots {
        if i > 0 {
            rendered.push(',');
        }
        match values.get(i) {
            Some(value) => rendered.push_str(value),
            // Fewer captured values than declared slots: keep the slot text.
            None => rendered.push_str(declared[i].trim()),
        }
    }
    rendered.push(')');
    rendered.push_str(&signature[close + 1..]);
    escape(&rendered)
}

/// Keep the label valid inside the surrounding quoted string: escape
/// backslash and quote, strip embedded newlines and tabs (a raw newline
/// would break the one-document-per-line framing).
fn escape(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' | '\r' | '\t' => {}
            c => out.push(c),
        }
    }
    out
}
