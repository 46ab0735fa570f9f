//! Upload filename checks.
//!
//! Only the extension is consulted for the allow-list; the decoder is the
//! final authority on whether the bytes are really an image.

/// Extensions accepted for upload (compared lower-case).
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Fallback stored name when sanitization leaves nothing.
const FALLBACK_NAME: &str = "upload";

/// Max length of a sanitized filename.
const MAX_NAME_LEN: usize = 100;

/// Lower-cased extension after the last dot, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the filename carries an allowed image extension.
pub fn allowed_file(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Reduce an uploaded filename to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    // Keep only the last path component, then drop anything unsafe
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let sanitized: String = base
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Collapse dot runs and leading dots (no hidden files, no "..")
    let mut sanitized = sanitized;
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }
    let sanitized = sanitized.trim_start_matches(['.', '_']).to_string();

    // Truncate from the front so the extension survives
    let sanitized = if sanitized.len() > MAX_NAME_LEN {
        sanitized[sanitized.len() - MAX_NAME_LEN..].to_string()
    } else {
        sanitized
    };

    if sanitized.is_empty() || sanitized == "." {
        FALLBACK_NAME.into()
    } else {
        sanitized
    }
}

/// Whether `name` is a single plain path component safe to join onto a
/// storage directory.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}
