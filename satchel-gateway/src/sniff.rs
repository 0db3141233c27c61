/// Number of leading bytes considered by content-type detection.
pub const SNIFF_LEN: usize = 512;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Detect a blob's content type from its leading bytes.
///
/// Magic-byte match first, then a UTF-8 text heuristic, else
/// `application/octet-stream`. A pure function of the first [`SNIFF_LEN`]
/// bytes: the same payload always sniffs to the same type.
pub fn detect_content_type(data: &[u8]) -> String {
    let prefix = &data[..data.len().min(SNIFF_LEN)];

    if let Some(kind) = infer::get(prefix) {
        return kind.mime_type().to_string();
    }

    if is_text(prefix, data.len() > SNIFF_LEN) {
        TEXT_PLAIN.to_string()
    } else {
        OCTET_STREAM.to_string()
    }
}

// A truncated prefix may end mid-codepoint; only that trailing cut is
// forgiven.
fn is_text(prefix: &[u8], truncated: bool) -> bool {
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(err) => truncated && err.error_len().is_none(),
    }
}
