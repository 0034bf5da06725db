//! Geometric primitives for annotation placement.
//!
//! Rectangles are stored by their corners rather than origin plus size so
//! that a rectangle read from a document can be written back bit-for-bit.

use crate::object::Object;

/// A 2D point in page or layout space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle given by its lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge
    pub x1: f64,
    /// Bottom edge
    pub y1: f64,
    /// Right edge
    pub x2: f64,
    /// Top edge
    pub y2: f64,
}

impl Rect {
    /// Create a rectangle from its corners, normalising their order.
    ///
    /// # Examples
    ///
    /// ```
    /// use markup_swap::geometry::Rect;
    ///
    /// let r = Rect::new(110.0, 70.0, 10.0, 20.0);
    /// assert_eq!((r.x1, r.y1, r.x2, r.y2), (10.0, 20.0, 110.0, 70.0));
    /// ```
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Create a rectangle from an origin and a size.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Read a `/Rect`-style array of four finite numbers.
    ///
    /// Returns `None` for anything else, including non-finite values.
    pub fn from_object(obj: &Object) -> Option<Self> {
        let arr = obj.as_array()?;
        if arr.len() != 4 {
            return None;
        }
        let mut v = [0.0f64; 4];
        for (slot, item) in v.iter_mut().zip(arr) {
            let n = item.as_number()?;
            if !n.is_finite() {
                return None;
            }
            *slot = n;
        }
        Some(Self::new(v[0], v[1], v[2], v[3]))
    }

    /// Encode as a four-number array.
    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            Object::Real(self.x1),
            Object::Real(self.y1),
            Object::Real(self.x2),
            Object::Real(self.y2),
        ])
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Clamp every edge into `bounds`.
    ///
    /// The result always lies inside `bounds`; a rectangle entirely outside
    /// collapses onto the nearest edge.
    pub fn clamp_into(&self, bounds: &Rect) -> Rect {
        Rect {
            x1: self.x1.clamp(bounds.x1, bounds.x2),
            y1: self.y1.clamp(bounds.y1, bounds.y2),
            x2: self.x2.clamp(bounds.x1, bounds.x2),
            y2: self.y2.clamp(bounds.y1, bounds.y2),
        }
    }

    /// True when `other` lies entirely within this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x1 >= self.x1 && other.y1 >= self.y1 && other.x2 <= self.x2 && other.y2 <= self.y2
    }

    /// Map a rectangle from a canonical layout space into page space.
    ///
    /// `origin` is where the layout's (0, 0) lands and `scale` is applied
    /// uniformly on both axes.
    pub fn map_from_layout(&self, origin: Point, scale: f64) -> Rect {
        Rect::new(
            origin.x + self.x1 * scale,
            origin.y + self.y1 * scale,
            origin.x + self.x2 * scale,
            origin.y + self.y2 * scale,
        )
    }
}
