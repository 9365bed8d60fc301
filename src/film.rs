use assert2::assert;

use crate::geometry::{FloatType, ScreenBlock, ScreenPoint, ScreenSize};
use crate::screen_block::ScreenBlockExt as _;

pub type Color = rgb::RGB<FloatType>;

/// Accumulation buffer: running sum of samples and sample count for every pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct Film {
    size: ScreenSize,
    sums: Vec<Color>,
    counts: Vec<u32>,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Film {
        let pixel_count = width as usize * height as usize;
        Film {
            size: ScreenSize::new(width, height),
            sums: vec![Color::default(); pixel_count],
            counts: vec![0; pixel_count],
        }
    }

    pub fn width(&self) -> u32 {
        self.size.x
    }

    pub fn height(&self) -> u32 {
        self.size.y
    }

    pub fn size(&self) -> ScreenSize {
        self.size
    }

    /// Block covering the whole film
    pub fn block(&self) -> ScreenBlock {
        ScreenBlock::new(ScreenPoint::origin(), ScreenPoint::from(self.size))
    }

    /// Changes the resolution, discarding everything accumulated so far.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Film::new(width, height);
    }

    pub fn clear(&mut self) {
        self.sums.fill(Color::default());
        self.counts.fill(0);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        assert!(x < self.size.x && y < self.size.y, "Pixel {x}, {y} is outside of the film");
        x as usize + y as usize * self.size.x as usize
    }

    /// Adds one sample to a pixel.
    pub fn splat(&mut self, x: u32, y: u32, color: Color) {
        let index = self.index(x, y);
        let sum = &mut self.sums[index];
        sum.r += color.r;
        sum.g += color.g;
        sum.b += color.b;
        self.counts[index] += 1;
    }

    /// Adds one sample to every pixel of the block, `samples` in row major order.
    pub fn splat_block(&mut self, block: &ScreenBlock, samples: &[Color]) {
        assert!(samples.len() == block.area() as usize);
        for (point, color) in block.internal_points().zip(samples) {
            self.splat(point.x, point.y, *color);
        }
    }

    /// Raw accumulated sum of a pixel.
    pub fn sum(&self, x: u32, y: u32) -> Color {
        self.sums[self.index(x, y)]
    }

    pub fn sample_count(&self, x: u32, y: u32) -> u32 {
        self.counts[self.index(x, y)]
    }

    /// Average of the samples of a pixel multiplied by exposure. Black for pixels without samples.
    pub fn get(&self, x: u32, y: u32, exposure: FloatType) -> Color {
        let index = self.index(x, y);
        let count = self.counts[index];
        if count == 0 {
            return Color::default();
        }

        let scale = exposure / count as FloatType;
        let sum = self.sums[index];
        Color::new(sum.r * scale, sum.g * scale, sum.b * scale)
    }

    /// Writes the exposure scaled film as RGBA bytes into the buffer.
    /// Panics if the buffer is not exactly `width * height * 4` bytes long.
    pub fn write_rgba(&self, buffer: &mut [u8], exposure: FloatType) {
        assert!(buffer.len() == self.sums.len() * 4, "RGBA buffer size doesn't match the film");

        for (point, chunk) in self.block().internal_points().zip(buffer.chunks_exact_mut(4)) {
            chunk.copy_from_slice(&color_to_rgba(self.get(point.x, point.y, exposure)));
        }
    }

    pub fn to_rgba_bytes(&self, exposure: FloatType) -> Vec<u8> {
        let mut buffer = vec![0; self.sums.len() * 4];
        self.write_rgba(&mut buffer, exposure);
        buffer
    }

    pub fn to_image(&self, exposure: FloatType) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.size.x, self.size.y, |x, y| {
            image::Rgba(color_to_rgba(self.get(x, y, exposure)))
        })
    }
}

/// Clamped 8 bit RGBA with full opacity. Channels are truncated, not rounded.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let convert = |v: FloatType| (v * 255.0).clamp(0.0, 255.0) as u8;
    [convert(color.r), convert(color.g), convert(color.b), 255]
}
