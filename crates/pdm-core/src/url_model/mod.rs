//! URL modeling and filename derivation.
//!
//! Derives safe local filenames from `Content-Disposition`, `Content-Location`
//! or the URL path, sanitized so they are valid on FAT storage, and finds a
//! free name when the destination is already taken.

mod content_disposition;
mod path;
mod sanitize;

pub use content_disposition::parse_content_disposition_filename;
pub use path::filename_from_url_path;
pub use sanitize::sanitize_filename;

/// Default filename when every source yields nothing usable.
pub const DEFAULT_FILENAME: &str = "downloadfile";

/// Derives a safe filename for saving a download.
///
/// Preference order: filename from `content_disposition`, last path segment
/// of `content_location`, last path segment of `url`. The result is
/// sanitized; an empty or reserved result falls back to `DEFAULT_FILENAME`.
///
/// # Examples
///
/// - `derive_filename("https://example.com/archive.zip", None, None)` → `"archive.zip"`
/// - `derive_filename("https://example.com/", Some("attachment; filename=\"report.pdf\""), None)` → `"report.pdf"`
pub fn derive_filename(url: &str, content_disposition: Option<&str>, content_location: Option<&str>) -> String {
    let candidate = content_disposition
        .and_then(parse_content_disposition_filename)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            content_location.and_then(|loc| {
                url::Url::parse(url)
                    .ok()
                    .and_then(|base| base.join(loc).ok())
                    .and_then(|u| filename_from_url_path(u.as_str()))
            })
        })
        .or_else(|| filename_from_url_path(url));

    let raw = match candidate {
        Some(c) => c,
        None => return DEFAULT_FILENAME.to_string(),
    };

    let sanitized = sanitize_filename(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Returns `name` if `taken(name)` is false, else the first free
/// `stem (N).ext` with N counting up from 1.
pub fn unique_filename(name: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(name) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    let mut n = 1u32;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_filename_from_url_path() {
        assert_eq!(
            derive_filename("https://example.com/archive.zip", None, None),
            "archive.zip"
        );
        assert_eq!(
            derive_filename("https://cdn.example.com/path/to/debian-12.iso", None, None),
            "debian-12.iso"
        );
    }

    #[test]
    fn derive_filename_content_disposition_overrides_url() {
        assert_eq!(
            derive_filename(
                "https://example.com/archive.zip",
                Some("attachment; filename=\"real-name.tar.gz\""),
                None
            ),
            "real-name.tar.gz"
        );
    }

    #[test]
    fn derive_filename_from_content_location() {
        assert_eq!(
            derive_filename("https://example.com/get?id=3", None, Some("/files/movie.mkv")),
            "movie.mkv"
        );
    }

    #[test]
    fn derive_filename_fallbacks() {
        assert_eq!(derive_filename("https://example.com/", None, None), DEFAULT_FILENAME);
        assert_eq!(derive_filename("https://example.com/..", None, None), DEFAULT_FILENAME);
        assert_eq!(
            derive_filename("https://example.com/x", Some("attachment; filename=\"...\""), None),
            DEFAULT_FILENAME
        );
    }

    #[test]
    fn unique_filename_counts_up() {
        let taken = ["a.bin", "a (1).bin"];
        assert_eq!(unique_filename("a.bin", |n| taken.contains(&n)), "a (2).bin");
        assert_eq!(unique_filename("b.bin", |n| taken.contains(&n)), "b.bin");
        assert_eq!(unique_filename("noext", |n| n == "noext"), "noext (1)");
    }
}
