//! Output file naming.
//!
//! Filenames read back from a package are untrusted, so every helper here
//! keeps only the final path component.

use std::path::Path;

/// Used when a name reduces to nothing usable.
const FALLBACK_NAME: &str = "image";

/// Strip directories (either separator) and reject `.`/`..`/empty names.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match last {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        other => other.to_string(),
    }
}

/// `photo.png` -> `encrypted_photo.png.enc`
pub fn encrypted_file_name(original: &str) -> String {
    format!("encrypted_{}.enc", sanitize_file_name(original))
}

/// `photo.png` -> `decrypted_photo.png`. With `extension`, the original
/// extension is replaced (`decrypted_photo.bmp`).
pub fn decrypted_file_name(original: &str, extension: Option<&str>) -> String {
    let name = sanitize_file_name(original);
    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_NAME);

    let ext = match extension {
        Some(ext) => Some(ext.trim_start_matches('.')),
        None => path.extension().and_then(|e| e.to_str()),
    };

    match ext {
        Some(ext) if !ext.is_empty() => format!("decrypted_{stem}.{ext}"),
        _ => format!("decrypted_{stem}.png"),
    }
}
