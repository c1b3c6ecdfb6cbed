//! SVG to PNG conversion

use resvg::{tiny_skia, usvg};
use tracing::debug;

use super::RenderError;

/// Converts SVG markup into opaque PNG images
///
/// System fonts are loaded once, when the rasterizer is built.
pub struct Rasterizer {
    options: usvg::Options<'static>,
    scale: f32,
}

impl Rasterizer {
    pub fn new(dpi: f32, scale: f32) -> Self {
        debug!(dpi, scale, "Rasterizer::new: called");
        let mut options = usvg::Options {
            dpi,
            ..usvg::Options::default()
        };
        options.fontdb_mut().load_system_fonts();
        Self { options, scale }
    }

    /// Rasterize `svg` onto a white background
    pub fn rasterize(&self, svg: &str) -> Result<Vec<u8>, RenderError> {
        debug!(svg_len = svg.len(), "Rasterizer::rasterize: called");
        let tree = usvg::Tree::from_str(svg, &self.options).map_err(|e| RenderError::Raster(e.to_string()))?;

        let size = tree
            .size()
            .to_int_size()
            .scale_by(self.scale)
            .ok_or_else(|| RenderError::Raster(format!("cannot scale image by {}", self.scale)))?;
        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
            .ok_or_else(|| RenderError::Raster(format!("invalid image size {}x{}", size.width(), size.height())))?;
        pixmap.fill(tiny_skia::Color::WHITE);

        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(self.scale, self.scale),
            &mut pixmap.as_mut(),
        );

        let png = pixmap.encode_png().map_err(|e| RenderError::Raster(e.to_string()))?;
        debug!(width = size.width(), height = size.height(), png_len = png.len(), "Rasterizer::rasterize: done");
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::service::mock::SAMPLE_SVG;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    fn png_dimensions(png: &[u8]) -> (u32, u32) {
        // IHDR is always the first chunk
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        (width, height)
    }

    #[test]
    fn test_rasterize_scales_image() {
        let png = Rasterizer::new(300.0, 2.0).rasterize(SAMPLE_SVG).unwrap();
        assert!(png.starts_with(PNG_SIGNATURE));
        assert_eq!(png_dimensions(&png), (80, 40));
    }

    #[test]
    fn test_background_is_opaque_white() {
        let png = Rasterizer::new(96.0, 1.0).rasterize(SAMPLE_SVG).unwrap();
        let pixmap = tiny_skia::Pixmap::decode_png(&png).unwrap();
        let corner = pixmap.pixel(0, 0).unwrap();
        assert_eq!((corner.red(), corner.green(), corner.blue(), corner.alpha()), (255, 255, 255, 255));
    }

    #[test]
    fn test_rejects_non_svg() {
        let err = Rasterizer::new(300.0, 2.0).rasterize("not svg").unwrap_err();
        assert!(matches!(err, RenderError::Raster(_)));
    }
}
