//! Sphere to polyhedron projection: one raster per mesh face, textured from
//! an equirectangular panorama seen from the mesh origin.
//!
//! Every face is flattened into its own basis. The first face rendered fixes
//! the pixels per unit from `max_width`, so all faces share one physical scale
//! and tile back together at net scale. Faces are independent of each other
//! and render in parallel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{Rgba, RgbaImage};
use polyptych_config::RenderConfig;
use polyptych_hedron::Polyhedron;
use polyptych_math::{Basis, Bounds2, DVec2, Transform2, contains_point, distance_to_boundary};
use rayon::prelude::*;

use crate::error::RenderError;
use crate::error_log::ErrorLog;
use crate::sphere::SphereMap;

/// Shared flag checked before each face starts. Faces already rendering
/// finish normally.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Pixel width of the first face.
    pub max_width: u32,
    /// Sub-samples per pixel along each axis.
    pub oversample: u32,
    /// When false only sizes and placements are computed.
    pub generate_images: bool,
    pub parallel: bool,
    /// Rotation applied to every sample direction before the sphere lookup.
    pub extra_basis: Option<Basis>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for RenderSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            max_width: config.max_width,
            oversample: config.oversample,
            generate_images: config.generate_images,
            parallel: config.parallel,
            extra_basis: None,
        }
    }
}

/// The raster of one mesh face and where it sits in the face's own plane.
#[derive(Clone, Debug)]
pub struct FaceRaster {
    pub face: usize,
    pub width: u32,
    pub height: u32,
    /// Face basis coordinates of the image's top left corner.
    pub origin: DVec2,
    /// Face basis units per pixel along x and y.
    pub scale: DVec2,
    /// The face polygon in its basis.
    pub polygon: Vec<DVec2>,
    pub image: Option<RgbaImage>,
}

impl FaceRaster {
    /// Pixel coordinates to face basis coordinates. Net faces use the same
    /// basis, so following this with a net face matrix gives net space.
    #[must_use]
    pub fn image_to_local(&self) -> Transform2 {
        Transform2::from_scale(self.scale.x, self.scale.y)
            .then(&Transform2::from_translation(self.origin))
    }

    /// Pixels per face unit along x.
    #[must_use]
    pub fn pixels_per_unit(&self) -> f64 {
        1.0 / self.scale.x
    }
}

/// Face geometry computed before any pixels are touched.
struct FacePlan {
    face: usize,
    basis: Basis,
    polygon: Vec<DVec2>,
    bounds: Bounds2,
    width: u32,
    height: u32,
}

impl FacePlan {
    fn scale(&self) -> DVec2 {
        DVec2::new(
            self.bounds.width() / f64::from(self.width.max(1)),
            self.bounds.height() / f64::from(self.height.max(1)),
        )
    }
}

/// Projects a sphere map onto the faces of one polyhedron.
pub struct SphereToPoly<'a> {
    hedron: &'a Polyhedron,
    sphere: Option<&'a SphereMap>,
    settings: RenderSettings,
}

impl<'a> SphereToPoly<'a> {
    pub fn new(
        hedron: &'a Polyhedron,
        sphere: Option<&'a SphereMap>,
        settings: RenderSettings,
    ) -> Result<Self, RenderError> {
        if settings.max_width == 0 {
            return Err(RenderError::InvalidSettings("max_width must be positive".into()));
        }
        if settings.oversample == 0 {
            return Err(RenderError::InvalidSettings("oversample must be positive".into()));
        }
        if settings.generate_images && sphere.is_none() {
            return Err(RenderError::InvalidSettings("generating images needs a sphere map".into()));
        }
        Ok(Self {
            hedron,
            sphere,
            settings,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `faces` in order. The first face sets the scale; a face that
    /// fails is logged and left out so the rest still render.
    pub fn render(
        &self,
        faces: &[usize],
        cancel: &CancelToken,
        log: &mut ErrorLog,
    ) -> Result<Vec<FaceRaster>, RenderError> {
        let plans = self.plan(faces, log)?;
        let job = |plan: &FacePlan| -> Option<FaceRaster> {
            if cancel.is_cancelled() {
                return None;
            }
            Some(self.rasterize(plan))
        };
        let results: Vec<Option<FaceRaster>> = if self.settings.parallel {
            plans.par_iter().map(job).collect()
        } else {
            plans.iter().map(job).collect()
        };

        let mut rasters = Vec::with_capacity(results.len());
        for (plan, result) in plans.iter().zip(results) {
            match result {
                Some(raster) => {
                    tracing::info!(
                        face = plan.face,
                        width = raster.width,
                        height = raster.height,
                        "rendered face"
                    );
                    log.info(
                        Some(plan.face),
                        format!("rendered {}x{}", raster.width, raster.height),
                    );
                    rasters.push(raster);
                }
                None => {
                    log.warn(Some(plan.face), "skipped, render cancelled");
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled {
                completed: rasters.len(),
                log: log.clone(),
            });
        }
        Ok(rasters)
    }

    fn plan(&self, faces: &[usize], log: &mut ErrorLog) -> Result<Vec<FacePlan>, RenderError> {
        let mut pixels_per_unit = None;
        let mut plans = Vec::with_capacity(faces.len());
        for &face in faces {
            let basis = match self.hedron.basis_of_face(face) {
                Ok(b) => b,
                Err(err) => {
                    log.fail(Some(face), err.to_string());
                    continue;
                }
            };
            let polygon = self.hedron.face_polygon(face)?;
            let bounds = Bounds2::from_points(polygon.iter().copied());
            let ppu = match pixels_per_unit {
                Some(ppu) => ppu,
                None => {
                    if bounds.width() <= 0.0 {
                        return Err(RenderError::NoScale(face));
                    }
                    let ppu = f64::from(self.settings.max_width) / bounds.width();
                    pixels_per_unit = Some(ppu);
                    ppu
                }
            };
            let width = (bounds.width() * ppu) as u32;
            let height = (bounds.height() * ppu) as u32;
            if width == 0 || height == 0 {
                log.warn(Some(face), format!("too small to render at {ppu} pixels per unit"));
            }
            plans.push(FacePlan {
                face,
                basis,
                polygon,
                bounds,
                width,
                height,
            });
        }
        Ok(plans)
    }

    fn rasterize(&self, plan: &FacePlan) -> FaceRaster {
        let scale = plan.scale();
        let origin = plan.bounds.min;
        let image = match self.sphere {
            Some(sphere) if self.settings.generate_images => {
                Some(self.paint(plan, sphere, origin, scale))
            }
            _ => None,
        };
        FaceRaster {
            face: plan.face,
            width: plan.width,
            height: plan.height,
            origin,
            scale,
            polygon: plan.polygon.clone(),
            image,
        }
    }

    fn paint(&self, plan: &FacePlan, sphere: &SphereMap, origin: DVec2, scale: DVec2) -> RgbaImage {
        let k = self.settings.oversample;
        let step = 1.0 / f64::from(k);
        // pixels touching the outline are filled too, so neighboring faces meet without gaps
        let border = scale.max_element();
        let mut samples = Vec::with_capacity((k * k) as usize);
        RgbaImage::from_fn(plan.width, plan.height, |x, y| {
            let center = origin + (DVec2::new(f64::from(x), f64::from(y)) + 0.5) * scale;
            if !contains_point(&plan.polygon, center)
                && distance_to_boundary(&plan.polygon, center) > border
            {
                return Rgba([0, 0, 0, 0]);
            }
            samples.clear();
            for i in 0..k {
                for j in 0..k {
                    let sub = DVec2::new(
                        f64::from(x) + step * (f64::from(i) + 0.5),
                        f64::from(y) + step * (f64::from(j) + 0.5),
                    );
                    let mut p = plan.basis.unflatten(origin + sub * scale);
                    if let Some(extra) = &self.settings.extra_basis {
                        p = extra.to_local(p);
                    }
                    samples.push(sphere.sample(p));
                }
            }
            let [r, g, b] = average_clamped(&samples);
            Rgba([r, g, b, 255])
        })
    }
}

/// Box filter: average the samples, then clamp each channel to `[0, 1]`.
/// Clamping after averaging keeps over-bright samples from darkening seams.
#[must_use]
pub fn average_clamped(samples: &[[f32; 3]]) -> [u8; 3] {
    if samples.is_empty() {
        return [0; 3];
    }
    let mut sum = [0.0f32; 3];
    for s in samples {
        for c in 0..3 {
            sum[c] += s[c];
        }
    }
    let n = samples.len() as f32;
    sum.map(|c| ((c / n).clamp(0.0, 1.0) * 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgb32FImage};
    use polyptych_hedron::shapes;
    use polyptych_math::DVec3;

    const EPSILON: f64 = 1e-9;

    fn flat_sphere(color: [f32; 3]) -> SphereMap {
        SphereMap::from_rgb32f(Rgb32FImage::from_pixel(32, 16, Rgb(color))).unwrap()
    }

    fn settings(max_width: u32) -> RenderSettings {
        RenderSettings {
            max_width,
            oversample: 2,
            generate_images: true,
            parallel: false,
            extra_basis: None,
        }
    }

    #[test]
    fn test_first_face_sets_scale() {
        let cube = shapes::cube();
        let sphere = flat_sphere([1.0, 0.0, 0.0]);
        let projector = SphereToPoly::new(&cube, Some(&sphere), settings(20)).unwrap();
        let mut log = ErrorLog::new();
        let rasters = projector.render(&[0, 1], &CancelToken::new(), &mut log).unwrap();
        assert_eq!(rasters.len(), 2);
        for r in &rasters {
            assert_eq!((r.width, r.height), (20, 20));
            assert!((r.pixels_per_unit() - 10.0).abs() < EPSILON);
        }
        assert_eq!(log.len(), 2);
        assert!(!log.is_failed());
    }

    #[test]
    fn test_square_face_is_filled() {
        let cube = shapes::cube();
        let sphere = flat_sphere([0.0, 1.0, 0.0]);
        let projector = SphereToPoly::new(&cube, Some(&sphere), settings(10)).unwrap();
        let rasters = projector.render(&[0], &CancelToken::new(), &mut ErrorLog::new()).unwrap();
        let image = rasters[0].image.as_ref().unwrap();
        assert!(image.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn test_triangle_corners_are_transparent() {
        let tetra = shapes::tetrahedron();
        let sphere = flat_sphere([1.0, 1.0, 1.0]);
        let projector = SphereToPoly::new(&tetra, Some(&sphere), settings(40)).unwrap();
        let rasters = projector.render(&[0], &CancelToken::new(), &mut ErrorLog::new()).unwrap();
        let raster = &rasters[0];
        let image = raster.image.as_ref().unwrap();
        let opaque = image.pixels().filter(|p| p.0[3] == 255).count();
        let clear = image.pixels().filter(|p| p.0[3] == 0).count();
        assert!(opaque > 0 && clear > 0, "opaque {opaque}, clear {clear}");
        // every opaque pixel center lies inside or on the triangle outline
        let to_local = raster.image_to_local();
        for (x, y, p) in image.enumerate_pixels() {
            if p.0[3] == 255 {
                let c = to_local.apply(DVec2::new(f64::from(x) + 0.5, f64::from(y) + 0.5));
                assert!(
                    contains_point(&raster.polygon, c)
                        || distance_to_boundary(&raster.polygon, c)
                            <= raster.scale.max_element() + EPSILON
                );
            }
        }
    }

    #[test]
    fn test_average_then_clamp() {
        assert_eq!(average_clamped(&[[3.0, 0.0, 0.5], [0.0, 0.0, 0.5]]), [255, 0, 128]);
        assert_eq!(average_clamped(&[[-1.0, 0.2, 0.0]]), [0, 51, 0]);
        assert_eq!(average_clamped(&[]), [0, 0, 0]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let cube = shapes::cube();
        let sphere = SphereMap::from_rgb32f(Rgb32FImage::from_fn(64, 32, |x, y| {
            Rgb([x as f32 / 64.0, y as f32 / 32.0, 0.5])
        }))
        .unwrap();
        let faces: Vec<usize> = (0..6).collect();
        let sequential = SphereToPoly::new(&cube, Some(&sphere), settings(16))
            .unwrap()
            .render(&faces, &CancelToken::new(), &mut ErrorLog::new())
            .unwrap();
        let parallel_settings = RenderSettings {
            parallel: true,
            ..settings(16)
        };
        let parallel = SphereToPoly::new(&cube, Some(&sphere), parallel_settings)
            .unwrap()
            .render(&faces, &CancelToken::new(), &mut ErrorLog::new())
            .unwrap();
        for (a, b) in sequential.iter().zip(&parallel) {
            assert_eq!(a.face, b.face);
            assert_eq!(a.image, b.image);
        }
    }

    #[test]
    fn test_extra_basis_rotates_lookup() {
        let cube = shapes::cube();
        // upper half of rows bright, lower half dark
        let sphere = SphereMap::from_rgb32f(Rgb32FImage::from_fn(8, 8, |_, y| {
            if y >= 4 { Rgb([1.0; 3]) } else { Rgb([0.0; 3]) }
        }))
        .unwrap();
        let plain = SphereToPoly::new(&cube, Some(&sphere), settings(4))
            .unwrap()
            .render(&[0], &CancelToken::new(), &mut ErrorLog::new())
            .unwrap();
        // face 0 looks along +z; flipping z makes it look along -z
        let flip = Basis {
            z: -DVec3::Z,
            y: -DVec3::Y,
            ..Basis::IDENTITY
        };
        let flipped_settings = RenderSettings {
            extra_basis: Some(flip),
            ..settings(4)
        };
        let flipped = SphereToPoly::new(&cube, Some(&sphere), flipped_settings)
            .unwrap()
            .render(&[0], &CancelToken::new(), &mut ErrorLog::new())
            .unwrap();
        let bright = |r: &FaceRaster| r.image.as_ref().unwrap().pixels().all(|p| p.0[0] == 255);
        let dark = |r: &FaceRaster| r.image.as_ref().unwrap().pixels().all(|p| p.0[0] == 0);
        assert!(bright(&plain[0]));
        assert!(dark(&flipped[0]));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cube = shapes::cube();
        let sphere = flat_sphere([1.0; 3]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut log = ErrorLog::new();
        let err = SphereToPoly::new(&cube, Some(&sphere), settings(8))
            .unwrap()
            .render(&[0, 1, 2], &cancel, &mut log)
            .unwrap_err();
        match err {
            RenderError::Cancelled { completed, log } => {
                assert_eq!(completed, 0);
                assert_eq!(log.len(), 3);
            }
            other => panic!("expected cancel, got {other}"),
        }
    }

    #[test]
    fn test_sizes_without_images() {
        let cube = shapes::cube();
        let projector = SphereToPoly::new(
            &cube,
            None,
            RenderSettings {
                generate_images: false,
                ..settings(30)
            },
        )
        .unwrap();
        let rasters = projector.render(&[0], &CancelToken::new(), &mut ErrorLog::new()).unwrap();
        assert_eq!((rasters[0].width, rasters[0].height), (30, 30));
        assert!(rasters[0].image.is_none());
        assert!(SphereToPoly::new(&cube, None, settings(30)).is_err());
    }
}
