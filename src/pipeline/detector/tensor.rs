use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, NUM_LANDMARKS};

/// Square input of the palm detector.
pub const PALM_INPUT_SIZE: u32 = 192;
/// Square input of the landmark model.
pub const LANDMARK_INPUT_SIZE: u32 = 224;

/// How a frame was shrunk and padded into a square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub frame_w: u32,
    pub frame_h: u32,
}

impl Letterbox {
    pub fn for_frame(frame_w: u32, frame_h: u32, size: u32) -> Self {
        let scale = size as f32 / frame_w.max(frame_h).max(1) as f32;
        let fitted_w = (frame_w as f32 * scale).round().max(1.0) as u32;
        let fitted_h = (frame_h as f32 * scale).round().max(1.0) as u32;
        Self {
            scale,
            pad_x: (size.saturating_sub(fitted_w) / 2) as f32,
            pad_y: (size.saturating_sub(fitted_h) / 2) as f32,
            frame_w,
            frame_h,
        }
    }

    fn fitted(&self) -> (u32, u32) {
        (
            (self.frame_w as f32 * self.scale).round().max(1.0) as u32,
            (self.frame_h as f32 * self.scale).round().max(1.0) as u32,
        )
    }

    /// Maps a normalized point of the square input back to frame pixels.
    pub fn unproject(&self, nx: f32, ny: f32, size: u32) -> (f32, f32) {
        let side = size as f32;
        (
            (nx * side - self.pad_x) / self.scale,
            (ny * side - self.pad_y) / self.scale,
        )
    }
}

/// A rotated square region of the frame resampled to `size` x `size`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    /// Radians; positive turns clockwise on screen.
    pub angle: f32,
    pub size: u32,
    pub frame_w: u32,
    pub frame_h: u32,
}

impl CropTransform {
    /// Crop pixel -> frame pixel, clamped to the frame.
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let (fx, fy) = self.to_frame(x, y);
        (
            fx.clamp(0.0, self.frame_w.saturating_sub(1) as f32),
            fy.clamp(0.0, self.frame_h.saturating_sub(1) as f32),
        )
    }

    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.size as f32 / 2.0;
        let step = self.side / self.size as f32;
        let dx = (x - half) * step;
        let dy = (y - half) * step;
        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected {
        return Err(anyhow!(
            "frame buffer is {} bytes, expected {expected} for {}x{}",
            frame.rgba.len(),
            frame.width,
            frame.height
        ));
    }
    Ok(())
}

fn nhwc_tensor(size: u32, rgb: Vec<f32>) -> Result<Array4<f32>> {
    Array4::from_shape_vec((1, size as usize, size as usize, 3), rgb)
        .map_err(|err| anyhow!("failed to shape input tensor: {err}"))
}

/// Aspect-preserving resize into a black square, normalized to 0..1 RGB.
pub fn letterbox_tensor(frame: &Frame, size: u32) -> Result<(Array4<f32>, Letterbox)> {
    check_frame(frame)?;
    let letterbox = Letterbox::for_frame(frame.width, frame.height, size);
    let (fit_w, fit_h) = letterbox.fitted();

    let src = fir::images::ImageRef::new(
        frame.width,
        frame.height,
        &frame.rgba,
        fir::PixelType::U8x4,
    )?;
    let mut fitted = fir::images::Image::new(fit_w, fit_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut fitted, Some(&options))
        .context("letterbox resize failed")?;
    let fitted = fitted.into_vec();

    let side = size as usize;
    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    let (fit_w, fit_h) = (fit_w as usize, fit_h as usize);
    let mut rgb = vec![0.0f32; side * side * 3];
    rgb.par_chunks_exact_mut(side * 3)
        .enumerate()
        .for_each(|(y, row)| {
            if y < pad_y || y >= pad_y + fit_h {
                return;
            }
            let src_row = &fitted[(y - pad_y) * fit_w * 4..(y - pad_y + 1) * fit_w * 4];
            for (x, px) in src_row.chunks_exact(4).enumerate() {
                let dst = &mut row[(pad_x + x) * 3..(pad_x + x) * 3 + 3];
                dst[0] = px[0] as f32 / 255.0;
                dst[1] = px[1] as f32 / 255.0;
                dst[2] = px[2] as f32 / 255.0;
            }
        });

    Ok((nhwc_tensor(size, rgb)?, letterbox))
}

/// Resamples a rotated square of the frame into a `size` x `size` tensor.
pub fn rotated_crop_tensor(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    check_frame(frame)?;
    let transform = CropTransform {
        center,
        side,
        angle,
        size,
        frame_w: frame.width,
        frame_h: frame.height,
    };

    let n = size as usize;
    let mut rgb = vec![0.0f32; n * n * 3];
    rgb.par_chunks_exact_mut(n * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, dst) in row.chunks_exact_mut(3).enumerate() {
                let (sx, sy) = transform.to_frame(x as f32 + 0.5, y as f32 + 0.5);
                dst.copy_from_slice(&bilinear_rgb(frame, sx, sy));
            }
        });

    Ok((nhwc_tensor(size, rgb)?, transform))
}

/// Splits the flat landmark output into (x, y) crop pixels, dropping z.
pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<(f32, f32)>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "landmark output has {} values, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }
    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|xyz| (xyz[0], xyz[1]))
        .collect())
}

fn bilinear_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let texel = |ix: i64, iy: i64| -> [f32; 3] {
        if ix < 0 || iy < 0 || ix >= frame.width as i64 || iy >= frame.height as i64 {
            return [0.0; 3];
        }
        let at = (iy as usize * frame.width as usize + ix as usize) * 4;
        [
            frame.rgba[at] as f32 / 255.0,
            frame.rgba[at + 1] as f32 / 255.0,
            frame.rgba[at + 2] as f32 / 255.0,
        ]
    };

    // Pixel centers sit at +0.5.
    let (x, y) = (x - 0.5, y - 0.5);
    let (x0, y0) = (x.floor(), y.floor());
    let (tx, ty) = (x - x0, y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);
    let (a, b, c, d) = (
        texel(ix, iy),
        texel(ix + 1, iy),
        texel(ix, iy + 1),
        texel(ix + 1, iy + 1),
    );

    let mut out = [0.0; 3];
    for ch in 0..3 {
        let top = a[ch] + (b[ch] - a[ch]) * tx;
        let bottom = c[ch] + (d[ch] - c[ch]) * tx;
        out[ch] = top + (bottom - top) * ty;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let rgba = (0..width * height)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 255])
            .collect();
        Frame {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn letterbox_pads_the_short_side() {
        let lb = Letterbox::for_frame(640, 480, 192);
        assert!((lb.scale - 0.3).abs() < 1e-6);
        assert_eq!((lb.pad_x, lb.pad_y), (0.0, 24.0));
        let (x, y) = lb.unproject(0.5, 0.5, 192);
        assert!((x - 320.0).abs() < 1e-3);
        assert!((y - 240.0).abs() < 1e-3);
    }

    #[test]
    fn letterbox_tensor_leaves_padding_black() {
        let frame = solid_frame(40, 20, [255, 255, 255]);
        let (tensor, lb) = letterbox_tensor(&frame, 16).unwrap();
        assert_eq!(tensor.shape(), &[1, 16, 16, 3]);
        assert_eq!(lb.pad_y, 4.0);
        assert_eq!(tensor[[0, 0, 8, 0]], 0.0);
        assert!((tensor[[0, 8, 8, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_short_buffers() {
        let mut frame = solid_frame(4, 4, [0, 0, 0]);
        frame.rgba.pop();
        assert!(letterbox_tensor(&frame, 8).is_err());
        assert!(rotated_crop_tensor(&frame, (2.0, 2.0), 4.0, 0.0, 8).is_err());
    }

    #[test]
    fn crop_center_maps_to_crop_center() {
        let t = CropTransform {
            center: (100.0, 50.0),
            side: 40.0,
            angle: std::f32::consts::FRAC_PI_2,
            size: 224,
            frame_w: 640,
            frame_h: 480,
        };
        let (x, y) = t.project(112.0, 112.0);
        assert!((x - 100.0).abs() < 1e-3 && (y - 50.0).abs() < 1e-3);
        // Quarter turn clockwise: crop "right" points down the frame.
        let (x, y) = t.project(224.0, 112.0);
        assert!((x - 100.0).abs() < 1e-3 && (y - 70.0).abs() < 1e-3);
    }

    #[test]
    fn crop_outside_frame_samples_black() {
        let frame = solid_frame(8, 8, [255, 0, 0]);
        let (tensor, _) = rotated_crop_tensor(&frame, (4.0, 4.0), 8.0, 0.0, 8).unwrap();
        assert!((tensor[[0, 4, 4, 0]] - 1.0).abs() < 1e-6);
        let (far, _) = rotated_crop_tensor(&frame, (-100.0, -100.0), 8.0, 0.0, 8).unwrap();
        assert!(far.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn decodes_xy_pairs() {
        let flat: Vec<f32> = (0..63).map(|v| v as f32).collect();
        let points = decode_landmarks(&flat).unwrap();
        assert_eq!(points.len(), 21);
        assert_eq!(points[1], (3.0, 4.0));
        assert!(decode_landmarks(&flat[..60]).is_err());
    }
}
