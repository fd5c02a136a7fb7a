//! Content-type detection and download filename hygiene

/// MIME type of a decrypted payload, from its bytes alone.
///
/// Magic-number detection first; otherwise valid UTF-8 without NUL bytes is
/// text, and anything else is opaque binary.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.is_empty() {
        return "application/x-empty";
    }
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type();
    }
    if !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok() {
        return "text/plain";
    }
    "application/octet-stream"
}

/// Filename safe to place inside a quoted `Content-Disposition` value.
///
/// Keeps only the final path component, then strips quotes, control
/// characters (CR/LF and DEL included), and other reserved characters.
pub fn suggested_filename(display_name: &str) -> String {
    let base = display_name.rsplit(['/', '\\']).next().unwrap_or_default();
    // sanitize-filename keeps DEL, which header values reject
    let base: String = base.chars().filter(|c| !c.is_control()).collect();
    let clean = sanitize_filename::sanitize(&base);
    if clean.trim().is_empty() {
        "download".to_string()
    } else {
        clean
    }
}
