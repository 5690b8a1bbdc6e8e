//! Content type detection from body bytes
//!
//! Implements the signature-matching subset of the WHATWG MIME sniffing
//! algorithm. At most the first 512 bytes are examined and the result is
//! always a valid MIME type; `application/octet-stream` when nothing matches
//! and the data looks binary.

const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Markup tags recognized after leading whitespace, compared case-insensitively
const HTML_TAGS: [&[u8]; 17] = [
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Exact prefixes
const EXACT: [(&[u8], &str); 19] = [
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT_PLAIN),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"ID3", "audio/mpeg"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x00asm\x01\x00\x00\x00", "application/wasm"),
];

/// Prefixes where `?` bytes are wildcards (RIFF/FORM containers, fonts, RAR)
const MASKED: [(&[u8], &str); 10] = [
    (b"RIFF????WEBPVP", "image/webp"),
    (b"FORM????AIFF", "audio/aiff"),
    (b"RIFF????AVI ", "video/avi"),
    (b"RIFF????WAVE", "audio/wave"),
    (b"OTTO", "font/otf"),
    (b"\x00\x01\x00\x00", "font/ttf"),
    (b"ttcf", "font/collection"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"Rar!\x1A\x07", "application/x-rar-compressed"),
];

/// Detect the content type of `data`
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    if data.is_empty() {
        return TEXT_PLAIN;
    }

    let trimmed = skip_whitespace(data);
    if HTML_TAGS.iter().any(|tag| matches_html_tag(trimmed, tag)) {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some((_, mime)) = EXACT.iter().find(|(sig, _)| data.starts_with(sig)) {
        return mime;
    }
    if let Some((_, mime)) = MASKED.iter().find(|(sig, _)| matches_masked(data, sig)) {
        return mime;
    }
    if is_mp4(data) {
        return "video/mp4";
    }

    if data.iter().any(|b| is_binary_byte(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

/// Tag prefix, case-insensitive, followed by a space or `>`
fn matches_html_tag(data: &[u8], tag: &[u8]) -> bool {
    data.len() > tag.len()
        && data[..tag.len()].eq_ignore_ascii_case(tag)
        && matches!(data[tag.len()], b' ' | b'>')
}

fn matches_masked(data: &[u8], pattern: &[u8]) -> bool {
    data.len() >= pattern.len()
        && pattern
            .iter()
            .zip(data)
            .all(|(expected, actual)| *expected == b'?' || expected == actual)
}

/// ISO base media file with an `ftyp` box naming an `mp4` brand
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size < 12 || data.len() < box_size || box_size % 4 != 0 {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }
    // Brands at offset 8, then every 4 bytes; offset 12 is the minor version
    (8..box_size)
        .step_by(4)
        .filter(|offset| *offset != 12)
        .any(|offset| &data[offset..offset + 3] == b"mp4")
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"", "text/plain; charset=utf-8")]
    #[case(b"{\"a\":1}", "text/plain; charset=utf-8")]
    #[case(b"hello world", "text/plain; charset=utf-8")]
    #[case(b"  <html><body>hi</body></html>", "text/html; charset=utf-8")]
    #[case(b"<!DOCTYPE html>", "text/html; charset=utf-8")]
    #[case(b"<!-- comment -->", "text/html; charset=utf-8")]
    #[case(b"\n<?xml version=\"1.0\"?>", "text/xml; charset=utf-8")]
    #[case(b"%PDF-1.7", "application/pdf")]
    #[case(b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00", "image/png")]
    #[case(b"GIF89a....", "image/gif")]
    #[case(b"\xFF\xD8\xFF\xE0", "image/jpeg")]
    #[case(b"RIFF\x10\x00\x00\x00WEBPVP8 ", "image/webp")]
    #[case(b"RIFF\x10\x00\x00\x00WAVEfmt ", "audio/wave")]
    #[case(b"\x1F\x8B\x08\x00\x00", "application/x-gzip")]
    #[case(b"PK\x03\x04rest", "application/zip")]
    #[case(b"\x00asm\x01\x00\x00\x00", "application/wasm")]
    #[case(b"\x00\x01\x02\x03binary", "application/octet-stream")]
    fn test_detect_content_type(#[case] data: &[u8], #[case] expected: &str) {
        assert_eq!(detect_content_type(data), expected);
    }

    #[test]
    fn test_html_tag_requires_terminator() {
        assert_eq!(detect_content_type(b"<abbr>"), TEXT_PLAIN);
        assert_eq!(detect_content_type(b"<a href=x>"), "text/html; charset=utf-8");
    }

    #[test]
    fn test_mp4_brand() {
        let mut data = vec![0x00, 0x00, 0x00, 0x18];
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
        data.extend_from_slice(b"isommp41");
        assert_eq!(detect_content_type(&data), "video/mp4");
    }

    #[test]
    fn test_only_first_512_bytes_are_examined() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(detect_content_type(&data), TEXT_PLAIN);
    }
}
