/// Decode a plain-text upload.
///
/// UTF-8 is tried first; anything else is read as Latin-1, which maps every
/// byte to a code point and therefore cannot fail.
pub fn extract_txt(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(e) => {
            tracing::debug!("Text upload is not valid UTF-8 ({e}), decoding as Latin-1");
            decode_latin1(bytes)
        }
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
