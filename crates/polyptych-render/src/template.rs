//! File names for per-face rasters.

use std::path::{Path, PathBuf};

const DEFAULT_DIGITS: usize = 3;

/// A file name with one slot for a face index.
///
/// | Template | Face 7 |
/// |----------|--------|
/// | `face%03d.png` | `face007.png` |
/// | `face%d.png` | `face7.png` |
/// | `face####.png` | `face0007.png` |
/// | `face.png` | `face-007.png` |
/// | `face` | `face-007` |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileTemplate {
    prefix: String,
    digits: usize,
    suffix: String,
}

impl FileTemplate {
    #[must_use]
    pub fn parse(template: &str) -> Self {
        if let Some((prefix, digits, suffix)) =
            printf_slot(template).or_else(|| hash_slot(template))
        {
            return Self {
                prefix: prefix.to_string(),
                digits,
                suffix: suffix.to_string(),
            };
        }
        let (stem, ext) = split_extension(template);
        Self {
            prefix: format!("{stem}-"),
            digits: DEFAULT_DIGITS,
            suffix: ext.to_string(),
        }
    }

    /// Template for PNG rasters named after `base`, e.g. `render-000.png`.
    #[must_use]
    pub fn for_base(base: &str) -> Self {
        let mut template = Self::parse(base);
        if template.suffix.is_empty() {
            template.suffix = ".png".to_string();
        }
        template
    }

    #[must_use]
    pub fn name(&self, index: usize) -> String {
        format!("{}{index:0width$}{}", self.prefix, self.suffix, width = self.digits)
    }

    #[must_use]
    pub fn path_in(&self, dir: &Path, index: usize) -> PathBuf {
        dir.join(self.name(index))
    }
}

/// `%d` or `%0Nd`, returning the text around it and the pad width.
fn printf_slot(template: &str) -> Option<(&str, usize, &str)> {
    let start = template.find('%')?;
    let rest = &template[start + 1..];
    let end = rest.find('d')?;
    let flags = &rest[..end];
    let digits = if flags.is_empty() {
        1
    } else if let Some(width) = flags.strip_prefix('0') {
        width.parse().ok()?
    } else {
        return None;
    };
    Some((&template[..start], digits, &rest[end + 1..]))
}

/// A run of `#`, padded to its length.
fn hash_slot(template: &str) -> Option<(&str, usize, &str)> {
    let start = template.find('#')?;
    let len = template[start..].bytes().take_while(|&b| b == b'#').count();
    Some((&template[..start], len, &template[start + len..]))
}

fn split_extension(name: &str) -> (&str, &str) {
    let file_start = name.rfind(['/', '\\']).map_or(0, |i| i + 1);
    match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => name.split_at(file_start + dot),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(FileTemplate::parse("face%03d.png").name(7), "face007.png");
        assert_eq!(FileTemplate::parse("face%d.png").name(7), "face7.png");
        assert_eq!(FileTemplate::parse("face%05d.tif").name(123), "face00123.tif");
        assert_eq!(FileTemplate::parse("face####.png").name(7), "face0007.png");
        assert_eq!(FileTemplate::parse("f#").name(12), "f12");
    }

    #[test]
    fn test_missing_placeholder_is_inserted_before_extension() {
        assert_eq!(FileTemplate::parse("face.png").name(7), "face-007.png");
        assert_eq!(FileTemplate::parse("face").name(7), "face-007");
        assert_eq!(FileTemplate::parse("out.d/face").name(1), "out.d/face-001");
        assert_eq!(FileTemplate::parse(".hidden").name(1), ".hidden-001");
    }

    #[test]
    fn test_for_base_adds_png() {
        assert_eq!(FileTemplate::for_base("render").name(0), "render-000.png");
        assert_eq!(FileTemplate::for_base("tile%02d.jpg").name(4), "tile04.jpg");
    }

    #[test]
    fn test_path_in_dir() {
        let t = FileTemplate::parse("face%03d.png");
        assert_eq!(t.path_in(Path::new("out"), 3), Path::new("out").join("face003.png"));
    }
}
