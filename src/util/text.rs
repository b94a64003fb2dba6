use std::borrow::Cow;

#[inline]
fn is_stripped_control(b: u8) -> bool {
    b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d)
}

/// Strip control characters and ANSI escape sequences from feed-supplied text.
///
/// Feed titles and author names are attacker-controlled. A raw ESC or IRC
/// formatting byte (0x02 bold, 0x03 color, 0x1f underline...) would otherwise
/// reach every channel the relay writes to.
///
/// Strips:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - ANSI CSI sequences: `\x1b[` ... (final byte 0x40-0x7E)
/// - Bare ESC (0x1b)
///
/// Preserves tab, newline and carriage return; [`sanitize_line`] folds those.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if !bytes.iter().any(|&b| b == 0x1b || is_stripped_control(b)) {
        return Cow::Borrowed(s);
    }

    let len = bytes.len();
    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        if b == 0x1b {
            i += 1;
            if i < len && bytes[i] == b'[' {
                i += 1;
                while i < len {
                    let c = bytes[i];
                    i += 1;
                    if (0x40..=0x7e).contains(&c) {
                        break;
                    }
                }
            }
        } else if is_stripped_control(b) {
            i += 1;
        } else {
            let start = i;
            i += 1;
            while i < len && bytes[i] != 0x1b && !is_stripped_control(bytes[i]) {
                i += 1;
            }
            // Only ASCII bytes end a run, so the slice stays on char boundaries.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}

/// Reduce feed text to one chat line.
///
/// Control characters are stripped, then every run of whitespace (including
/// newlines and tabs) becomes a single space and the ends are trimmed. A chat
/// message must never contain a line break: the transport would send the
/// remainder as a separate raw command.
pub fn sanitize_line(s: &str) -> String {
    let stripped = strip_control_chars(s);
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
