//! Message chunking for fixed-size transport frames.
//!
//! Generated story text can be arbitrarily long, but the radio link
//! carries a fixed per-message budget. [`split`] partitions a message
//! into the fewest frames that each fit the budget once their ` (i/n)`
//! part suffix is appended, and [`join`] reverses the operation.
//!
//! Budgets are measured in characters (the link is text, not raw
//! bytes) and frames are cut on character boundaries.

/// Payload budget left after the transport's fixed per-frame prefix.
pub fn effective_len(frame_limit: usize, prefix_overhead: usize) -> usize {
    frame_limit.saturating_sub(prefix_overhead)
}

/// Split `text` into frames of at most `max_len` characters each.
///
/// A message that fits in one frame is returned as-is, with no part
/// suffix: a short message and a single-frame message are deliberately
/// indistinguishable, so no payload is wasted on a redundant marker.
///
/// A longer message is cut into the fewest frames such that every
/// frame *including* its ` (i/n)` suffix fits `max_len`. The suffix
/// width depends on the part count, which depends on the payload size,
/// which depends on the suffix width; the fixed point is resolved by
/// starting from a conservative width and tightening until stable.
///
/// A budget too small to carry even one payload character next to its
/// suffix cannot be honored by any chunking; such a misconfigured
/// `max_len` returns the text unsplit rather than emitting frames that
/// overflow on the suffix alone.
pub fn split(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut width = suffix_width(999);
    let mut total;
    loop {
        let payload = max_len.saturating_sub(width).max(1);
        total = chars.len().div_ceil(payload);
        let tightened = suffix_width(total);
        if tightened == width {
            break;
        }
        width = tightened;
    }

    let payload = match max_len.checked_sub(width) {
        Some(payload) if payload > 0 => payload,
        _ => return vec![text.to_string()],
    };
    let mut frames = Vec::with_capacity(total);
    for (i, piece) in chars.chunks(payload).enumerate() {
        let mut frame: String = piece.iter().collect();
        frame.push_str(&format!(" ({}/{})", i + 1, total));
        frames.push(frame);
    }
    frames
}

/// Reassemble the original text from an ordered frame sequence
/// produced by [`split`].
pub fn join(frames: &[String]) -> String {
    if frames.len() == 1 {
        return frames[0].clone();
    }
    frames.iter().map(|f| strip_part_suffix(f)).collect()
}

/// Width of the ` (i/n)` suffix for an `n`-part message, assuming the
/// worst case where `i` has as many digits as `n`.
fn suffix_width(n: usize) -> usize {
    // " (" + i + "/" + n + ")"
    4 + 2 * decimal_digits(n)
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Strip a trailing ` (i/n)` suffix, returning the frame payload.
/// Frames without a well-formed suffix are returned unchanged.
fn strip_part_suffix(frame: &str) -> &str {
    let Some(idx) = frame.rfind(" (") else {
        return frame;
    };
    let Some(inner) = frame[idx + 2..].strip_suffix(')') else {
        return frame;
    };
    let mut halves = inner.splitn(2, '/');
    let numeric = |s: Option<&str>| {
        s.is_some_and(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
    };
    if numeric(halves.next()) && numeric(halves.next()) {
        &frame[..idx]
    } else {
        frame
    }
}
