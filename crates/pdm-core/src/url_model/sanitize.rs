//! Filename sanitization for FAT-compatible storage.

/// Longest file name most filesystems accept, in bytes.
const NAME_MAX: usize = 255;

/// Characters FAT/exFAT (and therefore removable storage) reject.
fn is_reserved(c: char) -> bool {
    matches!(c, '"' | '*' | '/' | ':' | '<' | '>' | '?' | '\\' | '|') || c.is_control() || c == '\u{7f}'
}

/// Sanitizes a candidate filename so it is valid on FAT as well as Linux.
///
/// - Replaces `"*/:<>?\|`, NUL and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing spaces and dots
/// - Limits length to 255 bytes, keeping the extension when possible
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if is_reserved(c) { '_' } else { c };
        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.');
    truncate_keep_extension(trimmed, NAME_MAX)
}

fn truncate_keep_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if name.len() - dot <= 16 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    let mut take = max.saturating_sub(ext.len());
    while take > 0 && !stem.is_char_boundary(take) {
        take -= 1;
    }
    format!("{}{}", &stem[..take], ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_fat_reserved_characters() {
        assert_eq!(sanitize_filename("a/b\\c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_filename("what?:now*.mp4"), "what_now_.mp4");
        assert_eq!(sanitize_filename("<x>|\"y\".bin"), "_x_y_.bin");
    }

    #[test]
    fn trims_dots_and_spaces() {
        assert_eq!(sanitize_filename("  ..  file.txt  ..  "), "file.txt");
    }

    #[test]
    fn keeps_inner_spaces() {
        assert_eq!(sanitize_filename("my file (1).zip"), "my file (1).zip");
    }

    #[test]
    fn control_chars() {
        assert_eq!(sanitize_filename("file\x00name.txt"), "file_name.txt");
    }

    #[test]
    fn long_names_keep_extension() {
        let long = format!("{}.iso", "a".repeat(400));
        let s = sanitize_filename(&long);
        assert_eq!(s.len(), 255);
        assert!(s.ends_with(".iso"));
    }
}
