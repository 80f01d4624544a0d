use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};

/// Warm brown used for the sepia tone.
pub const SEPIA_TINT: [u8; 3] = [240, 200, 160];

/// Image filters operating on whole images
pub struct ImageFilters;

fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

impl ImageFilters {
    /// Gaussian blur with the given sigma
    pub fn apply_blur(img: DynamicImage, sigma: f32) -> DynamicImage {
        DynamicImage::ImageRgba8(imageops::blur(&img.to_rgba8(), sigma))
    }

    /// Sharpen with a 3x3 kernel; `intensity` scales the edge weights
    pub fn apply_sharpen(img: DynamicImage, intensity: f32) -> DynamicImage {
        let (width, height) = img.dimensions();
        let rgba8 = img.to_rgba8();
        let mut sharpened = RgbaImage::new(width, height);

        let kernel_center = 1.0 + intensity * 8.0;
        let kernel_edge = -intensity;

        for y in 0..height {
            for x in 0..width {
                let mut acc = [0.0f32; 3];

                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        let nx = (x as i32 + dx).clamp(0, width as i32 - 1) as u32;
                        let ny = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;

                        let pixel = rgba8.get_pixel(nx, ny);
                        let weight = if dx == 0 && dy == 0 {
                            kernel_center
                        } else {
                            kernel_edge
                        };

                        for (channel, value) in acc.iter_mut().enumerate() {
                            *value += pixel[channel] as f32 * weight;
                        }
                    }
                }

                let alpha = rgba8.get_pixel(x, y)[3];
                sharpened.put_pixel(
                    x,
                    y,
                    Rgba([
                        acc[0].clamp(0.0, 255.0) as u8,
                        acc[1].clamp(0.0, 255.0) as u8,
                        acc[2].clamp(0.0, 255.0) as u8,
                        alpha,
                    ]),
                );
            }
        }

        DynamicImage::ImageRgba8(sharpened)
    }

    /// Convert image to grayscale
    pub fn apply_grayscale(img: DynamicImage) -> DynamicImage {
        img.grayscale()
    }

    /// Scale saturation by `factor` (1.0 is no change, 0.0 is grayscale)
    pub fn scale_saturation(img: DynamicImage, factor: f32) -> DynamicImage {
        let mut rgba8 = img.to_rgba8();

        for pixel in rgba8.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let (r, g, b) = (r as f32, g as f32, b as f32);
            let gray = luminance(r, g, b);

            let scale = |c: f32| (gray + (c - gray) * factor).clamp(0.0, 255.0) as u8;
            *pixel = Rgba([scale(r), scale(g), scale(b), a]);
        }

        DynamicImage::ImageRgba8(rgba8)
    }

    /// Recolour towards `tint` while keeping each pixel's luminance
    pub fn apply_tint(img: DynamicImage, tint: [u8; 3]) -> DynamicImage {
        let mut rgba8 = img.to_rgba8();
        let [tr, tg, tb] = tint.map(f32::from);
        let tint_luma = luminance(tr, tg, tb);

        for pixel in rgba8.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let luma = luminance(r as f32, g as f32, b as f32);
            let shift = |c: f32| (luma + (c - tint_luma)).clamp(0.0, 255.0) as u8;
            *pixel = Rgba([shift(tr), shift(tg), shift(tb), a]);
        }

        DynamicImage::ImageRgba8(rgba8)
    }

    /// Sepia: slightly desaturate, then tint warm brown
    pub fn apply_sepia(img: DynamicImage) -> DynamicImage {
        Self::apply_tint(Self::scale_saturation(img, 0.7), SEPIA_TINT)
    }

    /// Invert colors
    pub fn apply_invert(img: DynamicImage) -> DynamicImage {
        let mut rgba8 = img.to_rgba8();
        for pixel in rgba8.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            *pixel = Rgba([255 - r, 255 - g, 255 - b, a]);
        }
        DynamicImage::ImageRgba8(rgba8)
    }

    /// Shrink to fit within `max_side` x `max_side`, never enlarging
    pub fn fit_within(img: DynamicImage, max_side: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        if width <= max_side && height <= max_side {
            return img;
        }
        img.resize(max_side, max_side, imageops::FilterType::Lanczos3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(rgba: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba(rgba)))
    }

    #[test]
    fn test_invert() {
        let inverted = ImageFilters::apply_invert(solid([255, 100, 50, 255])).to_rgba8();
        assert_eq!(inverted.get_pixel(0, 0).0, [0, 155, 205, 255]);
    }

    #[test]
    fn test_saturation_zero_is_gray() {
        let gray = ImageFilters::scale_saturation(solid([200, 50, 50, 255]), 0.0).to_rgba8();
        let p = gray.get_pixel(0, 0);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn test_saturation_boost_spreads_channels() {
        let boosted = ImageFilters::scale_saturation(solid([150, 100, 100, 255]), 2.0).to_rgba8();
        let p = boosted.get_pixel(0, 0);
        assert!(p[0] > 150);
        assert!(p[1] < 100);
    }

    #[test]
    fn test_tint_blue_dominates() {
        let tinted = ImageFilters::apply_tint(solid([128, 128, 128, 255]), [0, 0, 255]).to_rgba8();
        let p = tinted.get_pixel(0, 0);
        assert!(p[2] > p[0]);
        assert!(p[2] > p[1]);
    }

    #[test]
    fn test_sepia_is_warm() {
        let sepia = ImageFilters::apply_sepia(solid([128, 128, 128, 255])).to_rgba8();
        let p = sepia.get_pixel(0, 0);
        assert!(p[0] > p[2]);
    }

    #[test]
    fn test_blur_and_sharpen_keep_dimensions() {
        let blurred = ImageFilters::apply_blur(solid([10, 20, 30, 255]), 3.0);
        assert_eq!(blurred.dimensions(), (10, 10));
        let sharpened = ImageFilters::apply_sharpen(solid([10, 20, 30, 255]), 0.5);
        assert_eq!(sharpened.dimensions(), (10, 10));
        // A flat image has no edges to enhance
        assert_eq!(sharpened.to_rgba8().get_pixel(5, 5).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_fit_within_never_enlarges() {
        let small = DynamicImage::ImageRgba8(RgbaImage::new(100, 50));
        assert_eq!(ImageFilters::fit_within(small, 800).dimensions(), (100, 50));
        let large = DynamicImage::ImageRgba8(RgbaImage::new(1600, 400));
        assert_eq!(ImageFilters::fit_within(large, 800).dimensions(), (800, 200));
    }
}
