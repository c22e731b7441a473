//! Assembled net documents built from rendered face rasters.
//!
//! | Format | File | Contents |
//! |--------|------|----------|
//! | Svg | `<base>.svg` | one `<image>` per face, then fold and cut paths |
//! | Laidout | `<base>.laidout` | the net and one page per face image |
//! | Image | `<base>.png` | every face composited at raster scale |
//! | Qtvr | | not supported |
//! | None | | nothing |
//!
//! Documents are in net units with one unit per inch. Without a paper binding
//! the net's bounding box corner sits at the document origin.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use polyptych_config::OutputFormat;
use polyptych_hedron::attribute::Attribute;
use polyptych_math::{Bounds2, DVec2, Transform2};
use polyptych_net::{EdgeStyle, FaceTag, Net};
use rustc_hash::FxHashMap;

use crate::error::RenderError;
use crate::projector::FaceRaster;
use crate::template::FileTemplate;

pub const LAIDOUT_HEADER: &str = "#Laidout 0.08 Document";

/// Line width in document units.
const LINE_WIDTH: f64 = 0.01;

/// Where one face raster lands in the net.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    /// Mesh face.
    pub face: usize,
    /// Net face index.
    pub net_face: usize,
    pub file: String,
    pub width: u32,
    pub height: u32,
    /// Raster pixels to net space.
    pub image_to_net: Transform2,
}

/// A net together with the rasters of its actual faces.
pub struct Layout<'a> {
    net: &'a Net,
    placements: Vec<Placement>,
    rasters: FxHashMap<usize, &'a FaceRaster>,
    net_to_document: Transform2,
    bounds: Bounds2,
}

impl<'a> Layout<'a> {
    /// Pair each actual face of `net` with its raster. Faces without a raster
    /// are left out of the images but keep their lines.
    #[must_use]
    pub fn new(net: &'a Net, rasters: &'a [FaceRaster], template: &FileTemplate) -> Self {
        let rasters: FxHashMap<usize, &FaceRaster> = rasters.iter().map(|r| (r.face, r)).collect();
        let placements = net
            .faces()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.tag == FaceTag::Actual)
            .filter_map(|(i, f)| {
                let raster = rasters.get(&f.original)?;
                Some(Placement {
                    face: f.original,
                    net_face: i,
                    file: template.name(f.original),
                    width: raster.width,
                    height: raster.height,
                    image_to_net: raster.image_to_local().then(&f.matrix()),
                })
            })
            .collect();

        let net_bounds = net.bounds();
        let net_to_document = match &net.paper {
            Some(paper) => paper.transform,
            None => Transform2::from_translation(-net_bounds.min),
        };
        let bounds = Bounds2::from_points(
            net.faces()
                .iter()
                .filter(|f| f.tag == FaceTag::Actual)
                .flat_map(|f| f.polygon())
                .map(|p| net_to_document.apply(p)),
        );
        Self {
            net,
            placements,
            rasters,
            net_to_document,
            bounds,
        }
    }

    #[must_use]
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    #[must_use]
    pub fn net_to_document(&self) -> Transform2 {
        self.net_to_document
    }

    /// Document space bounds of the actual faces.
    #[must_use]
    pub fn bounds(&self) -> Bounds2 {
        self.bounds
    }

    // --- SVG ---

    #[must_use]
    pub fn svg(&self) -> String {
        let b = self.bounds;
        let m = self.net_to_document;
        let line_width = LINE_WIDTH / m.x_axis().length().max(f64::EPSILON);
        let mut out = String::new();
        let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}in" height="{h}in" viewBox="{x} {y} {w} {h}">"#,
            x = b.min.x,
            y = b.min.y,
            w = b.width(),
            h = b.height(),
        );
        let _ = writeln!(out, r#"  <g transform="{}">"#, svg_matrix(&m));
        for p in &self.placements {
            let _ = writeln!(
                out,
                r#"    <image xlink:href="{}" x="0" y="0" width="{}" height="{}" transform="{}"/>"#,
                xml_escape(&p.file),
                p.width,
                p.height,
                svg_matrix(&p.image_to_net),
            );
        }
        for line in self.net.lines() {
            let [a, c] = line.points;
            let dash = if line.style.is_fold() {
                format!(";stroke-dasharray:{},{}", line_width * 4.0, line_width * 2.0)
            } else {
                String::new()
            };
            let _ = writeln!(
                out,
                r#"    <path class="{}" d="M {} {} L {} {}" style="fill:none;stroke:#000000;stroke-width:{line_width};stroke-linecap:round{dash}"/>"#,
                style_class(line.style),
                a.x,
                a.y,
                c.x,
                c.y,
            );
        }
        let _ = writeln!(out, "  </g>");
        let _ = writeln!(out, "</svg>");
        out
    }

    // --- Laidout ---

    #[must_use]
    pub fn laidout(&self) -> String {
        let mut net = Attribute::new("net", None);
        if let Some(seed) = self.net.seed() {
            net.push(Attribute::with_value("info", seed));
        }
        for face in self.net.faces().iter().filter(|f| f.tag == FaceTag::Actual) {
            net.push(
                Attribute::new("face", None)
                    .child(Attribute::with_value("original", face.original))
                    .child(Attribute::with_value("matrix", matrix_values(&face.matrix()))),
            );
        }
        let mut root = Attribute::default();
        root.push(
            Attribute::new("docstyle", None)
                .child(Attribute::with_value("imposition", "Net").child(net)),
        );
        for (page, p) in self.placements.iter().enumerate() {
            let m = p.image_to_net.then(&self.net_to_document);
            root.push(
                Attribute::with_value("page", page).child(
                    Attribute::new("layer", None)
                        .child(Attribute::new("visible", None))
                        .child(Attribute::new("prints", None))
                        .child(
                            Attribute::with_value("object", format!("{page} ImageData"))
                                .child(Attribute::with_value("filename", &p.file))
                                .child(Attribute::with_value("width", p.width))
                                .child(Attribute::with_value("height", p.height))
                                .child(Attribute::with_value("matrix", matrix_values(&m))),
                        ),
                ),
            );
        }
        root.to_document(LAIDOUT_HEADER)
    }

    // --- Composite ---

    /// Every placed raster drawn into one image at the first raster's scale.
    pub fn composite(&self) -> Result<RgbaImage, RenderError> {
        let first = self.placements.first().ok_or(RenderError::Empty)?;
        let ppu = self
            .rasters
            .get(&first.face)
            .map(|r| r.pixels_per_unit())
            .ok_or(RenderError::Empty)?;
        let to_canvas = self
            .net_to_document
            .then(&Transform2::from_translation(-self.bounds.min))
            .then(&Transform2::from_scale(ppu, ppu));
        let width = (self.bounds.width() * ppu).ceil().max(1.0) as u32;
        let height = (self.bounds.height() * ppu).ceil().max(1.0) as u32;
        let mut canvas = RgbaImage::new(width, height);

        for p in &self.placements {
            let Some(image) = self.rasters.get(&p.face).and_then(|r| r.image.as_ref()) else {
                continue;
            };
            let forward = p.image_to_net.then(&to_canvas);
            let back = forward
                .inverse()
                .map_err(|source| RenderError::Degenerate { face: p.face, source })?;
            let (w, h) = (f64::from(p.width), f64::from(p.height));
            let reach = Bounds2::from_points(
                [DVec2::ZERO, DVec2::new(w, 0.0), DVec2::new(0.0, h), DVec2::new(w, h)]
                    .map(|c| forward.apply(c)),
            );
            let x0 = reach.min.x.floor().max(0.0) as u32;
            let y0 = reach.min.y.floor().max(0.0) as u32;
            let x1 = (reach.max.x.ceil().max(0.0) as u32).min(width);
            let y1 = (reach.max.y.ceil().max(0.0) as u32).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    let src = back.apply(DVec2::new(f64::from(x) + 0.5, f64::from(y) + 0.5));
                    if src.x < 0.0 || src.y < 0.0 || src.x >= w || src.y >= h {
                        continue;
                    }
                    let pixel = *image.get_pixel(src.x as u32, src.y as u32);
                    if pixel.0[3] > 0 {
                        canvas.put_pixel(x, y, pixel);
                    }
                }
            }
        }
        Ok(canvas)
    }

    // --- Files ---

    /// Write the layout for `format` as `<dir>/<base>.<ext>`. Returns the
    /// path written, or `None` for [`OutputFormat::None`].
    pub fn write(
        &self,
        format: OutputFormat,
        dir: &Path,
        base: &str,
    ) -> Result<Option<PathBuf>, RenderError> {
        let path = match format {
            OutputFormat::None => return Ok(None),
            OutputFormat::Qtvr => return Err(RenderError::UnsupportedFormat(format)),
            OutputFormat::Svg => dir.join(format!("{base}.svg")),
            OutputFormat::Laidout => dir.join(format!("{base}.laidout")),
            OutputFormat::Image => dir.join(format!("{base}.png")),
        };
        match format {
            OutputFormat::Image => {
                let canvas = self.composite()?;
                canvas.save(&path).map_err(|source| RenderError::Image {
                    path: path.clone(),
                    source,
                })?;
            }
            _ => {
                let text = if format == OutputFormat::Svg {
                    self.svg()
                } else {
                    self.laidout()
                };
                std::fs::write(&path, text).map_err(|source| RenderError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        tracing::info!(path = %path.display(), ?format, "wrote layout");
        Ok(Some(path))
    }
}

fn svg_matrix(m: &Transform2) -> String {
    let [a, b, c, d, e, f] = m.to_array();
    format!("matrix({a},{b},{c},{d},{e},{f})")
}

fn matrix_values(m: &Transform2) -> String {
    m.to_array().map(|x| x.to_string()).join(" ")
}

fn style_class(style: EdgeStyle) -> &'static str {
    match style {
        EdgeStyle::Fold | EdgeStyle::FoldPeak => "fold",
        EdgeStyle::FoldValley => "fold valley",
        EdgeStyle::SoftCut | EdgeStyle::HardCut => "cut",
        EdgeStyle::Unknown => "line",
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_log::ErrorLog;
    use crate::projector::{CancelToken, RenderSettings, SphereToPoly};
    use crate::sphere::SphereMap;
    use image::{Rgb, Rgb32FImage, Rgba};
    use polyptych_hedron::shapes;
    use polyptych_math::centroid;
    use polyptych_net::{PaperBinding, Unfolding};

    const EPSILON: f64 = 1e-9;

    fn unwrapped_cube() -> Unfolding {
        let mut session = Unfolding::new(shapes::cube()).unwrap();
        let id = session.establish_net(0).unwrap();
        session.total_unwrap(id).unwrap();
        session
    }

    fn rasters(session: &Unfolding, images: bool) -> Vec<FaceRaster> {
        let gray = Rgb32FImage::from_pixel(16, 8, Rgb([0.5, 0.5, 0.5]));
        let sphere = SphereMap::from_rgb32f(gray).unwrap();
        let settings = RenderSettings {
            max_width: 8,
            oversample: 1,
            generate_images: images,
            parallel: false,
            extra_basis: None,
        };
        let faces = session.nets()[0].actual_originals();
        SphereToPoly::new(session.hedron(), Some(&sphere), settings)
            .unwrap()
            .render(&faces, &CancelToken::new(), &mut ErrorLog::new())
            .unwrap()
    }

    #[test]
    fn test_placements_land_on_net_faces() {
        let session = unwrapped_cube();
        let rasters = rasters(&session, false);
        let net = &session.nets()[0];
        let layout = Layout::new(net, &rasters, &FileTemplate::parse("face%03d.png"));
        assert_eq!(layout.placements().len(), 6);
        for p in layout.placements() {
            let raster = rasters.iter().find(|r| r.face == p.face).unwrap();
            let to_pixels = raster.image_to_local().inverse().unwrap();
            let expected = net.face_polygon(p.net_face).unwrap();
            for (local, want) in raster.polygon.iter().zip(&expected) {
                let got = p.image_to_net.apply(to_pixels.apply(*local));
                assert!((got - *want).length() < EPSILON, "face {}: {got} vs {want}", p.face);
            }
        }
        assert!(layout.bounds().min.abs_diff_eq(DVec2::ZERO, EPSILON));
    }

    #[test]
    fn test_faces_without_raster_keep_only_lines() {
        let session = unwrapped_cube();
        let mut rasters = rasters(&session, false);
        let dropped = rasters.remove(2).face;
        let net = &session.nets()[0];
        let layout = Layout::new(net, &rasters, &FileTemplate::parse("face%03d.png"));
        assert_eq!(layout.placements().len(), 5);
        assert!(layout.placements().iter().all(|p| p.face != dropped));
        let svg = layout.svg();
        assert!(!svg.contains(&format!("face{dropped:03}.png")));
        assert_eq!(svg.matches("<path").count(), net.lines().len());
    }

    #[test]
    fn test_svg_images_and_lines() {
        let session = unwrapped_cube();
        let rasters = rasters(&session, false);
        let net = &session.nets()[0];
        let svg = Layout::new(net, &rasters, &FileTemplate::parse("face%03d.png")).svg();
        assert_eq!(svg.matches("<image").count(), 6);
        assert!(svg.contains(r#"xlink:href="face005.png""#));
        assert_eq!(svg.matches("<path").count(), net.lines().len());
        let folds = net.lines().iter().filter(|l| l.style.is_fold()).count();
        assert_eq!(svg.matches("stroke-dasharray").count(), folds);
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_paper_binding_moves_document() {
        let mut session = unwrapped_cube();
        let id = session.nets()[0].id();
        let paper = Transform2::from_translation(DVec2::new(10.0, 20.0));
        session.set_paper(id, Some(PaperBinding { transform: paper })).unwrap();
        let rasters = rasters(&session, false);
        let layout = Layout::new(&session.nets()[0], &rasters, &FileTemplate::for_base("f"));
        let net_bounds = session.nets()[0].bounds();
        let shifted = net_bounds.min + DVec2::new(10.0, 20.0);
        assert!((layout.bounds().min - shifted).length() < EPSILON);
        assert!(layout.svg().contains("matrix(1,0,0,1,10,20)"));
    }

    #[test]
    fn test_laidout_pages_parse() {
        let session = unwrapped_cube();
        let rasters = rasters(&session, false);
        let template = FileTemplate::parse("face%03d.png");
        let text = Layout::new(&session.nets()[0], &rasters, &template).laidout();
        assert!(text.starts_with(LAIDOUT_HEADER));
        let doc = Attribute::parse(&text).unwrap();
        let pages: Vec<&Attribute> = doc.children.iter().filter(|a| a.name == "page").collect();
        assert_eq!(pages.len(), 6);
        let object = pages[0].find("layer").and_then(|l| l.find("object")).unwrap();
        assert_eq!(object.value_str(), "0 ImageData");
        assert_eq!(object.find("width").unwrap().value_str(), "8");
        let net = doc
            .find("docstyle")
            .and_then(|d| d.find("imposition"))
            .and_then(|i| i.find("net"));
        assert_eq!(net.and_then(|n| n.find("info")).map(Attribute::value_str), Some("0"));
        let face = net.and_then(|n| n.find("face")).unwrap();
        assert_eq!(face.find("original").map(Attribute::value_str), Some("0"));
    }

    #[test]
    fn test_composite_covers_faces_only() {
        let session = unwrapped_cube();
        let rasters = rasters(&session, true);
        let net = &session.nets()[0];
        let layout = Layout::new(net, &rasters, &FileTemplate::for_base("f"));
        let canvas = layout.composite().unwrap();
        // 8 pixels across a face two units wide
        let ppu = 4.0;
        assert_eq!(canvas.width(), (layout.bounds().width() * ppu).ceil() as u32);
        assert_eq!(canvas.height(), (layout.bounds().height() * ppu).ceil() as u32);
        let seed = net.actual_index(0).unwrap();
        let c = layout.net_to_document().apply(centroid(&net.face_polygon(seed).unwrap())) * ppu;
        assert_eq!(canvas.get_pixel(c.x as u32, c.y as u32).0[3], 255);
        // the unfolded cube is a cross; its bounding box corners are empty
        assert_eq!(canvas.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_write_formats() {
        let dir = tempfile::tempdir().unwrap();
        let session = unwrapped_cube();
        let rasters = rasters(&session, true);
        let layout = Layout::new(&session.nets()[0], &rasters, &FileTemplate::for_base("net"));
        assert_eq!(layout.write(OutputFormat::None, dir.path(), "net").unwrap(), None);
        assert!(matches!(
            layout.write(OutputFormat::Qtvr, dir.path(), "net"),
            Err(RenderError::UnsupportedFormat(OutputFormat::Qtvr))
        ));
        for format in [OutputFormat::Svg, OutputFormat::Laidout, OutputFormat::Image] {
            let path = layout.write(format, dir.path(), "net").unwrap().unwrap();
            assert!(path.exists(), "{format:?}");
        }
        assert!(dir.path().join("net.png").exists());
    }
}
