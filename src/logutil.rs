//! Keep player-typed text on one log line.

use std::fmt::Write;

/// Longest reply preview written to the log.
const REPLY_PREVIEW: usize = 120;

/// Escape control characters and clip to [`REPLY_PREVIEW`] characters.
pub fn escape_log(s: &str) -> String {
    preview(s, REPLY_PREVIEW)
}

/// Escape `\n`, `\r`, `\t`, backslashes and other control characters (`\xNN`), and
/// clip the result to `max_chars` input characters with a trailing ellipsis.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_chars {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
