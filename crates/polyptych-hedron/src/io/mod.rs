//! Reading and writing polyhedron files.
//!
//! | Format | Read | Write | Notes |
//! |--------|------|-------|-------|
//! | idat   | yes  | yes   | native indented attributes, starts with `#Polyp` |
//! | OFF    | yes  | yes   | `[ST][C][N][4][n]OFF` headers |
//! | OBJ    | yes  | yes   | `v`, `f` and `o` lines only |
//! | VRML   | no   | yes   | one cylinder per edge |
//! | GLB    | no   | yes   | binary glTF 2.0, fan-triangulated |
//! | FOLD   | no   | yes   | JSON |

pub mod fold;
pub mod glb;
pub mod idat;
pub mod obj;
pub mod off;
pub mod vrml;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::HedronError;
use crate::polyhedron::Polyhedron;

/// Bytes inspected when sniffing a file's format.
const SNIFF_LEN: usize = 1000;

/// A polyhedron file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    Idat,
    Off,
    Obj,
    Vrml,
    Glb,
    Fold,
}

impl MeshFormat {
    pub const READABLE: [MeshFormat; 3] = [MeshFormat::Idat, MeshFormat::Off, MeshFormat::Obj];
    pub const WRITABLE: [MeshFormat; 6] = [
        MeshFormat::Idat,
        MeshFormat::Off,
        MeshFormat::Obj,
        MeshFormat::Vrml,
        MeshFormat::Glb,
        MeshFormat::Fold,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            MeshFormat::Idat => "idat",
            MeshFormat::Off => "off",
            MeshFormat::Obj => "obj",
            MeshFormat::Vrml => "vrml",
            MeshFormat::Glb => "glb",
            MeshFormat::Fold => "fold",
        }
    }

    /// Format implied by a file extension.
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<MeshFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wrl" => Some(MeshFormat::Vrml),
            "polyp" => Some(MeshFormat::Idat),
            other => other.parse().ok(),
        }
    }

    /// Guess the format from the start of a file.
    #[must_use]
    pub fn detect(head: &str) -> Option<MeshFormat> {
        if let Some(rest) = head.strip_prefix("#Polyp")
            && rest.starts_with(char::is_whitespace)
        {
            return Some(MeshFormat::Idat);
        }
        if off::looks_like_off(head) {
            return Some(MeshFormat::Off);
        }
        if ["\nv ", "\r\nv ", "\nf ", "\r\nf "].iter().any(|m| head.contains(m))
            || head.starts_with("v ")
        {
            return Some(MeshFormat::Obj);
        }
        None
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MeshFormat {
    type Err = HedronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idat" => Ok(MeshFormat::Idat),
            "off" => Ok(MeshFormat::Off),
            "obj" => Ok(MeshFormat::Obj),
            "vrml" => Ok(MeshFormat::Vrml),
            "glb" | "gltf" => Ok(MeshFormat::Glb),
            "fold" => Ok(MeshFormat::Fold),
            _ => Err(HedronError::UnknownFormatName(s.to_string())),
        }
    }
}

/// Parse polyhedron text in a known format.
pub fn read_str(text: &str, format: MeshFormat) -> Result<Polyhedron, HedronError> {
    match format {
        MeshFormat::Idat => idat::read(text),
        MeshFormat::Off => off::read(text),
        MeshFormat::Obj => obj::read(text),
        other => Err(HedronError::NotReadable(other.name())),
    }
}

/// Load a polyhedron, detecting its format from the contents.
pub fn load(path: &Path) -> Result<Polyhedron, HedronError> {
    let text = read_file(path)?;
    let head: String = text.chars().take(SNIFF_LEN).collect();
    let format = MeshFormat::detect(&head)
        .ok_or_else(|| HedronError::UnrecognizedFormat(path.to_path_buf()))?;
    tracing::debug!(path = %path.display(), %format, "loading polyhedron");
    read_str(&text, format)
}

/// Load a polyhedron in an explicit format.
pub fn load_as(path: &Path, format: MeshFormat) -> Result<Polyhedron, HedronError> {
    let text = read_file(path)?;
    read_str(&text, format)
}

/// Encode a polyhedron.
pub fn write(hedron: &Polyhedron, format: MeshFormat) -> Result<Vec<u8>, HedronError> {
    Ok(match format {
        MeshFormat::Idat => idat::write(hedron).into_bytes(),
        MeshFormat::Off => off::write(hedron)?.into_bytes(),
        MeshFormat::Obj => obj::write(hedron)?.into_bytes(),
        MeshFormat::Vrml => vrml::write(hedron)?.into_bytes(),
        MeshFormat::Glb => glb::write(hedron)?,
        MeshFormat::Fold => fold::write(hedron)?.into_bytes(),
    })
}

/// Save a polyhedron. The format defaults to the one implied by the extension.
/// An existing file is only replaced when `clobber` is set.
pub fn save(
    hedron: &Polyhedron,
    path: &Path,
    format: Option<MeshFormat>,
    clobber: bool,
) -> Result<MeshFormat, HedronError> {
    let format = match format {
        Some(f) => f,
        None => MeshFormat::from_extension(path).ok_or_else(|| {
            HedronError::UnknownFormatName(path.display().to_string())
        })?,
    };
    if !clobber && path.exists() {
        return Err(HedronError::FileExists(path.to_path_buf()));
    }
    let bytes = write(hedron, format)?;
    std::fs::write(path, bytes).map_err(|source| HedronError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), %format, "saved polyhedron");
    Ok(format)
}

fn read_file(path: &Path) -> Result<String, HedronError> {
    std::fs::read_to_string(path).map_err(|source| HedronError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Shortest round-trip rendering of a coordinate triple.
pub(crate) fn triple(v: polyptych_math::DVec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    fn same_topology(a: &Polyhedron, b: &Polyhedron) {
        assert_eq!(a.vertices.len(), b.vertices.len());
        assert_eq!(a.faces.len(), b.faces.len());
        for (fa, fb) in a.faces.iter().zip(&b.faces) {
            assert_eq!(fa.vertices, fb.vertices);
            assert_eq!(fa.adjacent, fb.adjacent);
        }
    }

    #[test]
    fn test_detect_formats() {
        assert_eq!(MeshFormat::detect("#Polyp\nname x\n"), Some(MeshFormat::Idat));
        assert_eq!(MeshFormat::detect("OFF\n8 6 12\n"), Some(MeshFormat::Off));
        assert_eq!(MeshFormat::detect("# c\nSTCOFF\n"), Some(MeshFormat::Off));
        assert_eq!(MeshFormat::detect("# obj\nv 0 0 0\nf 1 2 3\n"), Some(MeshFormat::Obj));
        assert_eq!(MeshFormat::detect("hello world"), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(MeshFormat::from_extension(Path::new("a/b.OFF")), Some(MeshFormat::Off));
        assert_eq!(MeshFormat::from_extension(Path::new("x.wrl")), Some(MeshFormat::Vrml));
        assert_eq!(MeshFormat::from_extension(Path::new("x.txt")), None);
    }

    #[test]
    fn test_round_trip_text_formats() {
        let cube = shapes::cube();
        for format in MeshFormat::READABLE {
            let bytes = write(&cube, format).unwrap();
            let text = String::from_utf8(bytes).unwrap();
            assert_eq!(MeshFormat::detect(&text), Some(format), "{format} not detected");
            let back = read_str(&text, format).unwrap();
            same_topology(&cube, &back);
        }
    }

    #[test]
    fn test_save_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.off");
        let cube = shapes::cube();
        assert_eq!(save(&cube, &path, None, false).unwrap(), MeshFormat::Off);
        assert!(matches!(
            save(&cube, &path, None, false),
            Err(HedronError::FileExists(_))
        ));
        save(&cube, &path, None, true).unwrap();
        let loaded = load(&path).unwrap();
        same_topology(&cube, &loaded);
    }

    #[test]
    fn test_load_unrecognized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.dat");
        std::fs::write(&path, "not a mesh").unwrap();
        assert!(matches!(load(&path), Err(HedronError::UnrecognizedFormat(_))));
        assert!(matches!(
            load(&dir.path().join("missing.off")),
            Err(HedronError::Io { .. })
        ));
    }

    #[test]
    fn test_vrml_not_readable() {
        assert!(matches!(
            read_str("#VRML", MeshFormat::Vrml),
            Err(HedronError::NotReadable("vrml"))
        ));
    }
}
