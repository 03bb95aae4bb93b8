use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;
use rayon::prelude::*;

use super::{Rect, Surface};
use crate::{assets::Sprite, config::Rgb};

/// Row-major 2x3 affine: `(x, y) -> (a*x + c*y + e, b*x + d*y + f)`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Affine {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Affine {
    const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.e += self.a * x + self.c * y;
        self.f += self.b * x + self.d * y;
    }

    fn rotate(&mut self, radians: f32) {
        let (sin, cos) = radians.sin_cos();
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        self.a = a * cos + c * sin;
        self.b = b * cos + d * sin;
        self.c = c * cos - a * sin;
        self.d = d * cos - b * sin;
    }

    fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-9 {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    fn is_axis_aligned(&self) -> bool {
        self.b.abs() < 1e-6 && self.c.abs() < 1e-6 && self.a > 0.0 && self.d > 0.0
    }
}

/// CPU RGBA canvas. Reused between frames; scaled copies of axis-aligned
/// sprites are cached per target size.
pub struct PixelCanvas {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    transform: Affine,
    stack: Vec<Affine>,
    scaled: HashMap<(usize, u32, u32), Arc<RgbaImage>>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            rgba: vec![0; width as usize * height as usize * 4],
            transform: Affine::IDENTITY,
            stack: Vec::new(),
            scaled: HashMap::new(),
        }
    }

    /// Resets the transform and matches the canvas to the video size.
    pub fn begin_frame(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) != (self.width, self.height) {
            log::info!("stage canvas resized to {width}x{height}");
            self.width = width;
            self.height = height;
            self.rgba = vec![0; width as usize * height as usize * 4];
            self.scaled.clear();
        }
        self.transform = Affine::IDENTITY;
        self.stack.clear();
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    #[cfg(test)]
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) as usize) * 4;
        [
            self.rgba[idx],
            self.rgba[idx + 1],
            self.rgba[idx + 2],
            self.rgba[idx + 3],
        ]
    }

    fn scaled_copy(&mut self, sprite: &Sprite, w: u32, h: u32) -> Result<Arc<RgbaImage>> {
        let key = (Arc::as_ptr(sprite.image()) as usize, w, h);
        if let Some(hit) = self.scaled.get(&key) {
            return Ok(hit.clone());
        }

        let image = sprite.image();
        let scaled = if image.dimensions() == (w, h) {
            image.clone()
        } else {
            let src = fir::images::Image::from_vec_u8(
                image.width(),
                image.height(),
                image.as_raw().clone(),
                fir::PixelType::U8x4,
            )?;
            let mut dst = fir::images::Image::new(w, h, fir::PixelType::U8x4);
            let options = fir::ResizeOptions::new()
                .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
            fir::Resizer::new()
                .resize(&src, &mut dst, Some(&options))
                .with_context(|| format!("failed to scale {} to {w}x{h}", sprite.name()))?;
            let buffer = RgbaImage::from_raw(w, h, dst.into_vec())
                .context("scaled sprite buffer has wrong size")?;
            Arc::new(buffer)
        };

        self.scaled.insert(key, scaled.clone());
        Ok(scaled)
    }

    fn blit_scaled(&mut self, image: &RgbaImage, left: i64, top: i64) {
        let (cw, ch) = (self.width as i64, self.height as i64);
        let (iw, ih) = (image.width() as i64, image.height() as i64);
        let x0 = left.max(0);
        let x1 = (left + iw).min(cw);
        let y0 = top.max(0);
        let y1 = (top + ih).min(ch);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let stride = self.width as usize * 4;
        self.rgba
            .par_chunks_exact_mut(stride)
            .enumerate()
            .skip(y0 as usize)
            .take((y1 - y0) as usize)
            .for_each(|(y, row)| {
                let sy = (y as i64 - top) as u32;
                for x in x0..x1 {
                    let sx = (x - left) as u32;
                    let src = image.get_pixel(sx, sy).0;
                    blend(&mut row[x as usize * 4..x as usize * 4 + 4], src);
                }
            });
    }

    fn blit_transformed(&mut self, image: &RgbaImage, dest: Rect) {
        let Some(inverse) = self.transform.invert() else {
            return;
        };
        if dest.w <= 0.0 || dest.h <= 0.0 {
            return;
        }

        let corners = [
            self.transform.apply(dest.x, dest.y),
            self.transform.apply(dest.x + dest.w, dest.y),
            self.transform.apply(dest.x, dest.y + dest.h),
            self.transform.apply(dest.x + dest.w, dest.y + dest.h),
        ];
        let (min_x, max_x, min_y, max_y) = corners.iter().fold(
            (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
            |acc, (x, y)| (acc.0.min(*x), acc.1.max(*x), acc.2.min(*y), acc.3.max(*y)),
        );
        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().max(0.0) as u32).min(self.width);
        let y1 = (max_y.ceil().max(0.0) as u32).min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let scale_x = image.width() as f32 / dest.w;
        let scale_y = image.height() as f32 / dest.h;
        let stride = self.width as usize * 4;
        self.rgba
            .par_chunks_exact_mut(stride)
            .enumerate()
            .skip(y0 as usize)
            .take((y1 - y0) as usize)
            .for_each(|(y, row)| {
                for x in x0..x1 {
                    let (lx, ly) = inverse.apply(x as f32 + 0.5, y as f32 + 0.5);
                    let u = (lx - dest.x) * scale_x;
                    let v = (ly - dest.y) * scale_y;
                    if let Some(src) = sample_rgba(image, u, v) {
                        let idx = x as usize * 4;
                        blend(&mut row[idx..idx + 4], src);
                    }
                }
            });
    }
}

impl Surface for PixelCanvas {
    fn width(&self) -> f32 {
        self.width as f32
    }

    fn height(&self) -> f32 {
        self.height as f32
    }

    fn fill(&mut self, color: Rgb) {
        let px = color.to_rgba();
        for chunk in self.rgba.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    fn draw_image(&mut self, sprite: &Sprite, dest: Rect) {
        if self.transform.is_axis_aligned() {
            let (left, top) = self.transform.apply(dest.x, dest.y);
            let w = (dest.w * self.transform.a).round();
            let h = (dest.h * self.transform.d).round();
            if w < 1.0 || h < 1.0 {
                return;
            }
            match self.scaled_copy(sprite, w as u32, h as u32) {
                Ok(scaled) => {
                    self.blit_scaled(&scaled, left.round() as i64, top.round() as i64);
                    return;
                }
                Err(err) => log::warn!("falling back to sampled draw: {err:?}"),
            }
        }
        let image = sprite.image().clone();
        self.blit_transformed(&image, dest);
    }

    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(previous) = self.stack.pop() {
            self.transform = previous;
        }
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.transform.translate(x, y);
    }

    fn rotate(&mut self, degrees: f32) {
        self.transform.rotate(degrees.to_radians());
    }
}

/// Bilinear sample with transparent outside the image.
fn sample_rgba(image: &RgbaImage, u: f32, v: f32) -> Option<[u8; 4]> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if u.is_nan() || v.is_nan() || u < 0.0 || v < 0.0 || u >= w || v >= h {
        return None;
    }

    let fx = (u - 0.5).max(0.0);
    let fy = (v - 0.5).max(0.0);
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let p00 = image.get_pixel(x0, y0).0;
    let p10 = image.get_pixel(x1, y0).0;
    let p01 = image.get_pixel(x0, y1).0;
    let p11 = image.get_pixel(x1, y1).0;

    let lerp = |a: u8, b: u8, t: f32| a as f32 + (b as f32 - a as f32) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(p00[c], p10[c], tx);
        let bottom = lerp(p01[c], p11[c], tx);
        out[c] = (top + (bottom - top) * ty).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}

fn blend(dst: &mut [u8], src: [u8; 4]) {
    match src[3] {
        0 => {}
        255 => dst[..3].copy_from_slice(&src[..3]),
        alpha => {
            let a = alpha as u32;
            for c in 0..3 {
                dst[c] = ((src[c] as u32 * a + dst[c] as u32 * (255 - a) + 127) / 255) as u8;
            }
        }
    }
    dst[3] = 255;
}
