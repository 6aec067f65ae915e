//! HTML rendering for the fortunes page.

use crate::model::Fortune;

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

const PAGE_HEAD: &str =
    "<!DOCTYPE html><html><head><title>Fortunes</title></head><body><table><tr><th>id</th><th>message</th></tr>";
const PAGE_TAIL: &str = "</table></body></html>";

/// Appends the fortunes table to `out` in the order given.
pub fn render_fortunes(fortunes: &[Fortune], out: &mut Vec<u8>) {
    out.extend_from_slice(PAGE_HEAD.as_bytes());
    let mut id = [0u8; 11];
    for fortune in fortunes {
        out.extend_from_slice(b"<tr><td>");
        out.extend_from_slice(format_id(&mut id, fortune.id));
        out.extend_from_slice(b"</td><td>");
        escape_html(&fortune.message, out);
        out.extend_from_slice(b"</td></tr>");
    }
    out.extend_from_slice(PAGE_TAIL.as_bytes());
}

/// Escapes `& < > " '` so `text` is safe inside element content and quoted
/// attributes.
pub fn escape_html(text: &str, out: &mut Vec<u8>) {
    let bytes = text.as_bytes();
    let mut start = 0;
    for (index, &byte) in bytes.iter().enumerate() {
        let entity: &[u8] = match byte {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'"' => b"&quot;",
            b'\'' => b"&#39;",
            _ => continue,
        };
        out.extend_from_slice(&bytes[start..index]);
        out.extend_from_slice(entity);
        start = index + 1;
    }
    out.extend_from_slice(&bytes[start..]);
}

/// Formats `value` into the tail of `buf` without allocating.
fn format_id(buf: &mut [u8; 11], value: i32) -> &[u8] {
    let negative = value < 0;
    let mut n = value.unsigned_abs();
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    if negative {
        pos -= 1;
        buf[pos] = b'-';
    }
    &buf[pos..]
}
