use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Seeded generator used by every worker, factory and test.
pub type EngineRng = Pcg32;

pub fn seeded_rng(seed: u64) -> EngineRng {
    Pcg32::seed_from_u64(seed)
}

/// Deterministic stream of child seeds derived from one master seed.
///
/// Workers pull their seed from here in spawn order, so a fixed master seed
/// and thread count reproduce the same per-worker generators.
#[derive(Debug, Clone)]
pub struct SeedStream {
    rng: EngineRng,
}

impl SeedStream {
    pub fn new(master_seed: u64) -> Self {
        Self { rng: seeded_rng(master_seed) }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

/// Integer vertex position in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Inclusive integer bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Bounds {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Box covering a canvas of the given size, grown by `margin` on every side
    pub fn canvas(width: usize, height: usize, margin: i32) -> Self {
        Self::new(
            -margin,
            -margin,
            width as i32 - 1 + margin,
            height as i32 - 1 + margin,
        )
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.max_y = bounds.max_y.max(p.y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y + 1
    }

    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn intersect(&self, other: &Bounds) -> Option<Bounds> {
        let b = Bounds::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        (!b.is_empty()).then_some(b)
    }

    /// Grow (or shrink, for negative margins) on every side
    pub fn expand(&self, margin: i32) -> Bounds {
        Bounds::new(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
    }

    pub fn clamp_point(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(self.min_x, self.max_x.max(self.min_x)),
            p.y.clamp(self.min_y, self.max_y.max(self.min_y)),
        )
    }
}

/// Vertex average
pub fn centroid(points: &[Point]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let sx: f64 = points.iter().map(|p| p.x as f64).sum();
    let sy: f64 = points.iter().map(|p| p.y as f64).sum();
    Some((sx / n, sy / n))
}

#[inline]
fn orientation(a: Point, b: Point, c: Point) -> i64 {
    let v = (b.x as i64 - a.x as i64) * (c.y as i64 - a.y as i64)
        - (b.y as i64 - a.y as i64) * (c.x as i64 - a.x as i64);
    v.signum()
}

#[inline]
fn on_segment(a: Point, p: Point, b: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Closed-segment intersection test, touching counts as intersecting
pub fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == 0 && on_segment(p1, q1, p2))
        || (o2 == 0 && on_segment(p1, q2, p2))
        || (o3 == 0 && on_segment(q1, p1, q2))
        || (o4 == 0 && on_segment(q1, p2, q2))
}

/// True when any two non-adjacent edges of the closed polygon meet
pub fn is_self_intersecting(points: &[Point]) -> bool {
    let n = points.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        let (a1, a2) = (points[i], points[(i + 1) % n]);
        for j in (i + 1)..n {
            // skip edges that share a vertex with edge i
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (b1, b2) = (points[j], points[(j + 1) % n]);
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

/// Smallest interior angle at any vertex, in degrees. Zero-length edges yield 0.
pub fn min_vertex_angle_degrees(points: &[Point]) -> f64 {
    let n = points.len();
    let mut min_angle = 180.0f64;
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let cur = points[i];
        let next = points[(i + 1) % n];
        let (ax, ay) = ((prev.x - cur.x) as f64, (prev.y - cur.y) as f64);
        let (bx, by) = ((next.x - cur.x) as f64, (next.y - cur.y) as f64);
        let la = (ax * ax + ay * ay).sqrt();
        let lb = (bx * bx + by * by).sqrt();
        if la == 0.0 || lb == 0.0 {
            return 0.0;
        }
        let cos = ((ax * bx + ay * by) / (la * lb)).clamp(-1.0, 1.0);
        min_angle = min_angle.min(cos.acos().to_degrees());
    }
    min_angle
}

pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (dx, dy) = (b.x as f64 - ax, b.y as f64 - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// Smallest distance from any vertex to an edge it is not an endpoint of
pub fn min_vertex_edge_distance(points: &[Point]) -> f64 {
    let n = points.len();
    let mut min_dist = f64::INFINITY;
    for v in 0..n {
        for e in 0..n {
            let e_next = (e + 1) % n;
            if e == v || e_next == v {
                continue;
            }
            min_dist = min_dist.min(point_segment_distance(points[v], points[e], points[e_next]));
        }
    }
    min_dist
}

/// Straight (un-premultiplied) color with alpha, channels 0-255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argb {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Argb {
    pub const TRANSPARENT: Argb = Argb::new(0, 0, 0, 0);
    pub const WHITE: Argb = Argb::new(255, 255, 255, 255);
    pub const BLACK: Argb = Argb::new(255, 0, 0, 0);

    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Canvas byte order
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn channel(self, index: usize) -> u8 {
        match index {
            0 => self.a,
            1 => self.r,
            2 => self.g,
            _ => self.b,
        }
    }

    pub fn with_channel(self, index: usize, value: u8) -> Self {
        let mut c = self;
        match index {
            0 => c.a = value,
            1 => c.r = value,
            2 => c.g = value,
            _ => c.b = value,
        }
        c
    }
}

impl Default for Argb {
    fn default() -> Self {
        Argb::WHITE
    }
}
