use num::{Float, Num};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point<T: Num> {
    pub x: T,
    pub y: T,
}

impl<T: Num> Point<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box stored as its two corners.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Box<T: Num> {
    pub x1: T,
    pub y1: T,
    pub x2: T,
    pub y2: T,
}

impl<T: Float> Box<T> {
    pub fn from_center(cx: T, cy: T, width: T, height: T) -> Self {
        let two = T::one() + T::one();
        Self {
            x1: cx - width / two,
            y1: cy - height / two,
            x2: cx + width / two,
            y2: cy + height / two,
        }
    }

    pub fn area(&self) -> T {
        (self.x2 - self.x1).max(T::zero()) * (self.y2 - self.y1).max(T::zero())
    }

    pub fn iou(&self, other: &Self) -> T {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(T::zero()) * (y2 - y1).max(T::zero());
        let union = self.area() + other.area() - intersection;

        if union > T::zero() {
            intersection / union
        } else {
            T::zero()
        }
    }

    pub fn contains(&self, x: T, y: T) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }
}

/// Closed outline of one detected instance, in pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon(Vec<Point<f32>>);

impl Polygon {
    pub const MIN_VERTICES: usize = 3;

    pub fn new(vertices: Vec<Point<f32>>) -> Option<Self> {
        (vertices.len() >= Self::MIN_VERTICES).then_some(Self(vertices))
    }

    pub fn vertices(&self) -> &[Point<f32>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vertices(self) -> Vec<Point<f32>> {
        self.0
    }
}
