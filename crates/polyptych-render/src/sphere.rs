//! Equirectangular source images and the direction to pixel mapping.
//!
//! | Direction | theta | gamma | u | v |
//! |-----------|-------|-------|---|---|
//! | +x | 0 | 0 | 0.5 | 0.5 |
//! | +y | pi/2 | 0 | 0.75 | 0.5 |
//! | -x | pi | 0 | 1 | 0.5 |
//! | +z | - | pi/2 | - | 1 |
//!
//! `v` grows with latitude and indexes image rows directly, so the south
//! pole is row 0.

use std::f64::consts::PI;
use std::path::Path;

use image::{DynamicImage, Rgb32FImage};
use polyptych_math::{DVec2, DVec3};

use crate::error::RenderError;

/// Longitude and latitude of a direction: `theta = atan2(y, x)` and
/// `gamma = atan(z / sqrt(x² + y²))`.
#[must_use]
pub fn spherical(p: DVec3) -> (f64, f64) {
    let theta = p.y.atan2(p.x);
    let r = (p.x * p.x + p.y * p.y).sqrt();
    // atan2 with r >= 0 is atan(z / r), and stays defined at the poles
    let gamma = p.z.atan2(r);
    (theta, gamma)
}

/// Texture coordinates of a direction, each clamped to `[0, 1]`.
#[must_use]
pub fn direction_to_uv(p: DVec3) -> DVec2 {
    let (theta, gamma) = spherical(p);
    let u = (theta / PI + 1.0) / 2.0;
    let v = gamma / PI + 0.5;
    DVec2::new(clamp_unit(u), clamp_unit(v))
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.5 } else { x.clamp(0.0, 1.0) }
}

/// An equirectangular panorama held as linear floating point RGB.
#[derive(Clone, Debug)]
pub struct SphereMap {
    image: Rgb32FImage,
}

impl SphereMap {
    pub fn open(path: &Path) -> Result<Self, RenderError> {
        let image = image::open(path).map_err(|source| RenderError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let map = Self::from_image(image)?;
        tracing::info!(
            path = %path.display(),
            width = map.width(),
            height = map.height(),
            "loaded sphere map"
        );
        Ok(map)
    }

    pub fn from_image(image: DynamicImage) -> Result<Self, RenderError> {
        Self::from_rgb32f(image.into_rgb32f())
    }

    pub fn from_rgb32f(image: Rgb32FImage) -> Result<Self, RenderError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::InvalidSettings("sphere map has no pixels".into()));
        }
        Ok(Self { image })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Nearest pixel seen in direction `p`: column `u·W`, row `v·H`,
    /// truncated and clamped into the image.
    #[must_use]
    pub fn pixel_of(&self, p: DVec3) -> (u32, u32) {
        let uv = direction_to_uv(p);
        let column = (uv.x * f64::from(self.width())) as u32;
        let row = (uv.y * f64::from(self.height())) as u32;
        (column.min(self.width() - 1), row.min(self.height() - 1))
    }

    #[must_use]
    pub fn sample(&self, p: DVec3) -> [f32; 3] {
        let (x, y) = self.pixel_of(p);
        self.image.get_pixel(x, y).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const EPSILON: f64 = 1e-12;

    fn map(width: u32, height: u32) -> SphereMap {
        SphereMap::from_rgb32f(Rgb32FImage::from_fn(width, height, |x, y| {
            Rgb([x as f32, y as f32, 0.0])
        }))
        .unwrap()
    }

    #[test]
    fn test_unit_x_is_theta_zero() {
        let (theta, gamma) = spherical(DVec3::X);
        assert!(theta.abs() < EPSILON);
        assert!(gamma.abs() < EPSILON);
        for width in [100, 101, 4096] {
            let sphere = map(width, 8);
            let (column, _) = sphere.pixel_of(DVec3::X);
            let expected = (0.5 * f64::from(width - 1)).round() as u32;
            assert_eq!(column, expected, "width {width}");
        }
    }

    #[test]
    fn test_uv_quadrants() {
        let uv = direction_to_uv(DVec3::Y);
        assert!((uv.x - 0.75).abs() < EPSILON, "got {uv}");
        let uv = direction_to_uv(-DVec3::Y);
        assert!((uv.x - 0.25).abs() < EPSILON, "got {uv}");
        let uv = direction_to_uv(DVec3::new(1.0, 0.0, 1.0));
        assert!((uv.y - 0.75).abs() < EPSILON, "got {uv}");
    }

    #[test]
    fn test_edges_clamp_into_image() {
        let sphere = map(16, 8);
        assert_eq!(sphere.pixel_of(-DVec3::X).0, 15);
        assert_eq!(sphere.pixel_of(DVec3::Z).1, 7);
        assert_eq!(sphere.pixel_of(-DVec3::Z).1, 0);
        // poles have no longitude; any column is fine but the lookup must not panic
        let _ = sphere.sample(DVec3::ZERO);
    }

    #[test]
    fn test_sample_reads_nearest_pixel() {
        let sphere = map(16, 8);
        assert_eq!(sphere.sample(DVec3::X), [8.0, 4.0, 0.0]);
    }

    #[test]
    fn test_empty_image_rejected() {
        assert!(SphereMap::from_rgb32f(Rgb32FImage::new(0, 4)).is_err());
    }
}
