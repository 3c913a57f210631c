//! Text codec for the chat stream: one byte per character, no framing.

/// Encode an operator line as US-ASCII. Characters outside ASCII become `?`.
pub fn encode_line(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

/// Decode received bytes as ISO-8859-1: each byte maps to exactly one char.
/// Callers pass only the bytes a read actually returned.
pub fn decode_chunk(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decode one raw line of operator input, dropping the `\n` or `\r\n` terminator.
/// UTF-8 when valid; otherwise the bytes are taken as ISO-8859-1 so a Latin-1 terminal still works.
pub fn decode_input_line(mut bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_suffix(b"\n") {
        bytes = rest.strip_suffix(b"\r").unwrap_or(rest);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => decode_chunk(bytes),
    }
}
