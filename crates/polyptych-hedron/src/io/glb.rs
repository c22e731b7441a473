//! Binary glTF 2.0 (`.glb`) export.
//!
//! ## Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic `glTF` (`0x46546C67`, little-endian) |
//! | 4 | 4 | Version (2) |
//! | 8 | 4 | Total file length |
//! | 12 | 4 | JSON chunk length J (multiple of 4) |
//! | 16 | 4 | Chunk type `JSON` (`0x4E4F534A`) |
//! | 20 | J | JSON, padded with spaces |
//! | 20+J | 4 | BIN chunk length B (multiple of 4) |
//! | 24+J | 4 | Chunk type `BIN\0` (`0x004E4942`) |
//! | 28+J | B | f32 positions, then u32 triangle indices, zero padded |

use serde_json::json;

use crate::error::HedronError;
use crate::polyhedron::Polyhedron;

const MAGIC: u32 = 0x4654_6C67;
const VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Lengths read back from an encoded file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlbSummary {
    pub total_len: usize,
    pub json_len: usize,
    pub bin_len: usize,
    pub buffer_byte_length: usize,
}

fn padded(len: usize) -> usize {
    len.div_ceil(4) * 4
}

/// Fan-triangulate every face.
fn triangles(p: &Polyhedron) -> Vec<u32> {
    let mut indices = Vec::new();
    for face in &p.faces {
        for i in 1..face.len().saturating_sub(1) {
            let triangle = [face.vertices[0], face.vertices[i], face.vertices[i + 1]];
            indices.extend(triangle.map(|v| v as u32));
        }
    }
    indices
}

pub fn write(p: &Polyhedron) -> Result<Vec<u8>, HedronError> {
    if p.vertices.is_empty() || p.faces.is_empty() {
        return Err(HedronError::Empty("faces"));
    }
    let indices = triangles(p);
    let positions_len = p.vertices.len() * 12;
    let indices_len = indices.len() * 4;
    let buffer_len = positions_len + indices_len;

    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for v in &p.vertices {
        for (k, c) in v.as_vec3().to_array().into_iter().enumerate() {
            min[k] = min[k].min(c);
            max[k] = max[k].max(c);
        }
    }

    let doc = json!({
        "asset": { "version": "2.0", "generator": "polyptych" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "name": p.name.as_deref().unwrap_or("polyhedron") }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "mode": 4 }] }],
        "buffers": [{ "byteLength": buffer_len }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": positions_len, "target": TARGET_ARRAY_BUFFER },
            { "buffer": 0, "byteOffset": positions_len, "byteLength": indices_len, "target": TARGET_ELEMENT_ARRAY_BUFFER },
        ],
        "accessors": [
            { "bufferView": 0, "componentType": COMPONENT_FLOAT, "count": p.vertices.len(), "type": "VEC3", "min": min, "max": max },
            { "bufferView": 1, "componentType": COMPONENT_UNSIGNED_INT, "count": indices.len(), "type": "SCALAR" },
        ],
    });
    let mut json_bytes = serde_json::to_vec(&doc)?;
    json_bytes.resize(padded(json_bytes.len()), b' ');

    let mut bin = Vec::with_capacity(padded(buffer_len));
    for v in &p.vertices {
        for c in v.as_vec3().to_array() {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in &indices {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.resize(padded(bin.len()), 0);

    let total = HEADER_LEN + 2 * CHUNK_HEADER_LEN + json_bytes.len() + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_bytes);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);

    // the lengths above must agree with each other exactly
    verify(&out)?;
    Ok(out)
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, HedronError> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(HedronError::ByteLengthMismatch {
            what: "glb header",
            expected: at + 4,
            actual: bytes.len(),
        })
}

/// Check every recorded length in an encoded file against the data present.
pub fn verify(bytes: &[u8]) -> Result<GlbSummary, HedronError> {
    if read_u32(bytes, 0)? != MAGIC {
        return Err(HedronError::MalformedHeader("missing glTF magic".to_string()));
    }
    if read_u32(bytes, 4)? != VERSION {
        return Err(HedronError::MalformedHeader("unsupported glTF version".to_string()));
    }
    let total_len = read_u32(bytes, 8)? as usize;
    if total_len != bytes.len() {
        return Err(HedronError::ByteLengthMismatch {
            what: "glb file",
            expected: total_len,
            actual: bytes.len(),
        });
    }
    let json_len = read_u32(bytes, 12)? as usize;
    if read_u32(bytes, 16)? != CHUNK_JSON {
        return Err(HedronError::MalformedHeader("first chunk is not JSON".to_string()));
    }
    let json_start = HEADER_LEN + CHUNK_HEADER_LEN;
    let json_end = json_start + json_len;
    let json = bytes.get(json_start..json_end).ok_or(HedronError::ByteLengthMismatch {
        what: "json chunk",
        expected: json_len,
        actual: bytes.len().saturating_sub(json_start),
    })?;
    let bin_len = read_u32(bytes, json_end)? as usize;
    if read_u32(bytes, json_end + 4)? != CHUNK_BIN {
        return Err(HedronError::MalformedHeader("second chunk is not BIN".to_string()));
    }
    let bin_start = json_end + CHUNK_HEADER_LEN;
    if bin_start + bin_len != bytes.len() {
        return Err(HedronError::ByteLengthMismatch {
            what: "bin chunk",
            expected: bin_len,
            actual: bytes.len().saturating_sub(bin_start),
        });
    }

    let doc: serde_json::Value = serde_json::from_slice(json)?;
    let buffer_byte_length = doc["buffers"][0]["byteLength"].as_u64().unwrap_or(0) as usize;
    if buffer_byte_length > bin_len || bin_len - buffer_byte_length >= 4 {
        return Err(HedronError::ByteLengthMismatch {
            what: "buffer",
            expected: buffer_byte_length,
            actual: bin_len,
        });
    }
    let views: usize = doc["bufferViews"]
        .as_array()
        .map(|vs| vs.iter().filter_map(|v| v["byteLength"].as_u64()).sum::<u64>() as usize)
        .unwrap_or(0);
    if views != buffer_byte_length {
        return Err(HedronError::ByteLengthMismatch {
            what: "buffer views",
            expected: buffer_byte_length,
            actual: views,
        });
    }
    Ok(GlbSummary {
        total_len,
        json_len,
        bin_len,
        buffer_byte_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    #[test]
    fn test_cube_lengths() {
        let bytes = write(&shapes::cube()).unwrap();
        let summary = verify(&bytes).unwrap();
        // 8 vertices * 12 bytes + 12 triangles * 3 * 4 bytes
        assert_eq!(summary.buffer_byte_length, 96 + 144);
        assert_eq!(summary.bin_len, 240);
        assert_eq!(summary.json_len % 4, 0);
        assert_eq!(summary.total_len, bytes.len());
    }

    #[test]
    fn test_truncated_file_is_mismatch() {
        let mut bytes = write(&shapes::tetrahedron()).unwrap();
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            verify(&bytes),
            Err(HedronError::ByteLengthMismatch { what: "glb file", .. })
        ));
    }

    #[test]
    fn test_corrupt_buffer_length() {
        let mut bytes = write(&shapes::tetrahedron()).unwrap();
        // 4 vertices * 12 + 4 triangles * 12 = 96; swapping one digit keeps chunk sizes intact
        let at = find(&bytes, b"\"buffers\":[{\"byteLength\":").unwrap() + 25;
        assert_eq!(bytes[at], b'9');
        bytes[at] = b'1';
        assert!(matches!(
            verify(&bytes),
            Err(HedronError::ByteLengthMismatch { what: "buffer", .. })
        ));
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }
}
