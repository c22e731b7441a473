//! Texture projection and net layout output for polyptych.
//!
//! [`render_net`] is the batch entry point: it projects a sphere map onto
//! every actual face of a net, writes one raster per face, and then writes
//! the assembled layout in the configured format.

mod error;
mod error_log;
mod layout;
mod projector;
mod sphere;
mod template;

use std::path::{Path, PathBuf};

use polyptych_config::OutputFormat;
use polyptych_hedron::Polyhedron;
use polyptych_net::Net;

pub use error::RenderError;
pub use error_log::{ErrorEntry, ErrorLog, Severity};
pub use layout::{LAIDOUT_HEADER, Layout, Placement};
pub use projector::{CancelToken, FaceRaster, RenderSettings, SphereToPoly, average_clamped};
pub use sphere::{SphereMap, direction_to_uv, spherical};
pub use template::FileTemplate;

/// What a render produced.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Face rasters written, in render order.
    pub files: Vec<PathBuf>,
    /// The assembled layout, if one was written.
    pub layout: Option<PathBuf>,
    pub log: ErrorLog,
}

/// Where and how [`render_net`] writes its files.
#[derive(Clone, Debug)]
pub struct RenderOutput<'a> {
    pub dir: &'a Path,
    /// Base name of the layout file; also the raster template when
    /// `template` is `None`.
    pub base: &'a str,
    pub template: Option<FileTemplate>,
    pub format: OutputFormat,
}

/// Render every actual face of `net`, seed first.
///
/// Faces that fail are recorded in the report's log and the rest still
/// render; check [`ErrorLog::is_failed`]. Cancellation and errors that stop
/// the whole run return `Err`.
pub fn render_net(
    hedron: &Polyhedron,
    net: &Net,
    sphere: Option<&SphereMap>,
    settings: RenderSettings,
    output: &RenderOutput<'_>,
    cancel: &CancelToken,
) -> Result<RenderReport, RenderError> {
    let faces: Vec<usize> = net
        .faces()
        .iter()
        .filter(|f| f.tag == polyptych_net::FaceTag::Actual)
        .map(|f| f.original)
        .collect();
    if faces.is_empty() {
        return Err(RenderError::Empty);
    }
    let template = output
        .template
        .clone()
        .unwrap_or_else(|| FileTemplate::for_base(output.base));
    tracing::info!(net = %net.id(), faces = faces.len(), format = ?output.format, "rendering net");

    let mut report = RenderReport::default();
    let projector = SphereToPoly::new(hedron, sphere, settings)?;
    let rasters = projector.render(&faces, cancel, &mut report.log)?;

    for raster in &rasters {
        let Some(image) = &raster.image else { continue };
        let path = template.path_in(output.dir, raster.face);
        match image.save(&path) {
            Ok(()) => report.files.push(path),
            Err(err) => {
                tracing::error!(face = raster.face, path = %path.display(), "{err}");
                report.log.fail(Some(raster.face), format!("writing {}: {err}", path.display()));
            }
        }
    }

    let layout = Layout::new(net, &rasters, &template);
    match layout.write(output.format, output.dir, output.base) {
        Ok(path) => report.layout = path,
        Err(RenderError::UnsupportedFormat(format)) => {
            tracing::warn!(?format, "layout format not supported, only face rasters written");
            report.log.warn(None, format!("{format:?} output is not supported"));
        }
        Err(err) => {
            report.log.fail(None, err.to_string());
        }
    }
    if report.log.is_failed() {
        tracing::warn!(
            failures = report.log.count(Severity::Fail),
            "render finished with failures"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgb32FImage};
    use polyptych_hedron::shapes;
    use polyptych_net::Unfolding;

    fn settings() -> RenderSettings {
        RenderSettings {
            max_width: 12,
            oversample: 2,
            generate_images: true,
            parallel: true,
            extra_basis: None,
        }
    }

    fn sphere() -> SphereMap {
        let ramp = Rgb32FImage::from_fn(32, 16, |x, _| Rgb([x as f32 / 32.0, 0.2, 0.8]));
        SphereMap::from_rgb32f(ramp).unwrap()
    }

    #[test]
    fn test_render_writes_rasters_and_svg() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Unfolding::new(shapes::cube()).unwrap();
        let id = session.establish_net(0).unwrap();
        session.total_unwrap(id).unwrap();
        let sphere = sphere();
        let output = RenderOutput {
            dir: dir.path(),
            base: "cube",
            template: None,
            format: OutputFormat::Svg,
        };
        let report = render_net(
            session.hedron(),
            session.net(id).unwrap(),
            Some(&sphere),
            settings(),
            &output,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.files.len(), 6);
        assert!(report.files.iter().all(|p| p.exists()));
        assert_eq!(report.files[0], dir.path().join("cube-000.png"));
        assert_eq!(report.layout, Some(dir.path().join("cube.svg")));
        assert!(!report.log.is_failed(), "{}", report.log);
        let face = image::open(&report.files[0]).unwrap();
        assert_eq!(face.width(), 12);
    }

    #[test]
    fn test_qtvr_still_writes_rasters() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Unfolding::new(shapes::tetrahedron()).unwrap();
        let id = session.establish_net(0).unwrap();
        session.total_unwrap(id).unwrap();
        let sphere = sphere();
        let output = RenderOutput {
            dir: dir.path(),
            base: "tetra",
            template: Some(FileTemplate::parse("t%02d.png")),
            format: OutputFormat::Qtvr,
        };
        let report = render_net(
            session.hedron(),
            session.net(id).unwrap(),
            Some(&sphere),
            settings(),
            &output,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.files.len(), 4);
        assert!(dir.path().join("t03.png").exists());
        assert_eq!(report.layout, None);
        assert_eq!(report.log.count(Severity::Warning), 1);
    }

    #[test]
    fn test_empty_net_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cube = shapes::cube();
        let net = Net::new(polyptych_hedron::NetId(1));
        let output = RenderOutput {
            dir: dir.path(),
            base: "x",
            template: None,
            format: OutputFormat::None,
        };
        assert!(matches!(
            render_net(&cube, &net, None, settings(), &output, &CancelToken::new()),
            Err(RenderError::Empty)
        ));
    }
}
