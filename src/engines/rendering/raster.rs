// -----------------------------------------------------------------------------
// Rasterization & blending
// -----------------------------------------------------------------------------
use crate::engines::generation::Gene;
use crate::types::{Argb, Bounds, Point};

/// Straight-alpha RGBA8 pixel buffer, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
        }
    }

    pub fn filled(width: usize, height: usize, color: Argb) -> Self {
        let mut canvas = Self::new(width, height);
        canvas.clear(color);
        canvas
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    pub fn clear(&mut self, color: Argb) {
        let rgba = color.to_rgba();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Overwrite with another canvas of the same size
    pub fn copy_from(&mut self, other: &Canvas) {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        self.pixels.copy_from_slice(&other.pixels);
    }

    #[inline]
    fn blend_span(&mut self, y: usize, x0: usize, x1: usize, src: [u8; 4]) {
        let row = y * self.width * 4;
        for px in self.pixels[row + x0 * 4..row + x1 * 4].chunks_exact_mut(4) {
            blend_src_over(px, src);
        }
    }
}

/// Src-over in unpremultiplied space, integer math with rounding
#[inline]
pub(crate) fn blend_src_over(dst: &mut [u8], src: [u8; 4]) {
    let a = src[3] as u32;
    if a == 0 {
        return;
    }
    let ia = 255 - a;

    let r = ((src[0] as u32 * a) + (dst[0] as u32 * ia) + 127) / 255;
    let g = ((src[1] as u32 * a) + (dst[1] as u32 * ia) + 127) / 255;
    let b = ((src[2] as u32 * a) + (dst[2] as u32 * ia) + 127) / 255;
    let da = dst[3] as u32;
    let a_out = (a + (da * ia + 127) / 255).min(255);

    dst[0] = r as u8;
    dst[1] = g as u8;
    dst[2] = b as u8;
    dst[3] = a_out as u8;
}

/// Even-odd scanline coverage of a closed polygon, sampled at pixel centers.
///
/// Calls `emit(y, x0, x1)` for each covered half-open span `[x0, x1)` on row
/// `y`, clipped to the canvas. Both the direct renderer and the polygon
/// cache go through this, so their coverage is identical.
pub fn for_each_span<F>(points: &[Point], width: usize, height: usize, mut emit: F)
where
    F: FnMut(usize, usize, usize),
{
    let Some(bounds) = Bounds::from_points(points) else {
        return;
    };
    if width == 0 || height == 0 {
        return;
    }
    let y_start = bounds.min_y.max(0);
    let y_end = bounds.max_y.min(height as i32 - 1);
    if y_start > y_end {
        return;
    }

    let n = points.len();
    let mut crossings: Vec<f64> = Vec::with_capacity(n);
    for y in y_start..=y_end {
        let sample = y as f64 + 0.5;
        crossings.clear();
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            let (ay, by) = (a.y as f64, b.y as f64);
            if (ay <= sample && by > sample) || (by <= sample && ay > sample) {
                let t = (sample - ay) / (by - ay);
                crossings.push(a.x as f64 + t * (b.x - a.x) as f64);
            }
        }
        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks_exact(2) {
            // pixel x is inside when its center x + 0.5 lies in [left, right)
            let x0 = (pair[0] - 0.5).ceil().max(0.0);
            let x1 = (pair[1] - 0.5).ceil().min(width as f64);
            if x1 > x0 {
                emit(y as usize, x0 as usize, x1 as usize);
            }
        }
    }
}

/// Draw one gene straight onto the canvas
pub fn fill_gene(canvas: &mut Canvas, gene: &Gene) {
    let src = gene.color().to_rgba();
    if src[3] == 0 {
        return;
    }
    let (w, h) = (canvas.width, canvas.height);
    for_each_span(gene.points(), w, h, |y, x0, x1| canvas.blend_span(y, x0, x1, src));
}

/// A gene's rendered footprint, cropped to the pixels it covers.
///
/// Holds coverage rather than blended pixels, so compositing it over any
/// canvas gives exactly what [`fill_gene`] would have drawn there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    mask: Vec<bool>,
    color: [u8; 4],
}

impl Sprite {
    pub fn rasterize(gene: &Gene, canvas_width: usize, canvas_height: usize) -> Self {
        let mut spans = Vec::new();
        for_each_span(gene.points(), canvas_width, canvas_height, |y, x0, x1| {
            spans.push((y, x0, x1))
        });

        let color = gene.color().to_rgba();
        if spans.is_empty() {
            return Self {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
                mask: Vec::new(),
                color,
            };
        }

        let min_x = spans.iter().map(|s| s.1).min().unwrap_or(0);
        let max_x = spans.iter().map(|s| s.2).max().unwrap_or(0);
        let min_y = spans.iter().map(|s| s.0).min().unwrap_or(0);
        let max_y = spans.iter().map(|s| s.0).max().unwrap_or(0);
        let width = max_x - min_x;
        let height = max_y - min_y + 1;

        let mut mask = vec![false; width * height];
        for (y, x0, x1) in spans {
            let row = (y - min_y) * width;
            for cell in &mut mask[row + x0 - min_x..row + x1 - min_x] {
                *cell = true;
            }
        }

        Self {
            x: min_x,
            y: min_y,
            width,
            height,
            mask,
            color,
        }
    }

    pub fn offset(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn covered_pixels(&self) -> usize {
        self.mask.iter().filter(|&&c| c).count()
    }

    /// Blend over `canvas`, which must have the size the sprite was cut from
    pub fn composite(&self, canvas: &mut Canvas) {
        if self.is_empty() || self.color[3] == 0 {
            return;
        }
        for row in 0..self.height {
            let cy = self.y + row;
            let base = (cy * canvas.width + self.x) * 4;
            let mask_row = &self.mask[row * self.width..(row + 1) * self.width];
            for (col, &covered) in mask_row.iter().enumerate() {
                if covered {
                    let i = base + col * 4;
                    blend_src_over(&mut canvas.pixels[i..i + 4], self.color);
                }
            }
        }
    }
}
