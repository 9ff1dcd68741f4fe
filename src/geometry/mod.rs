//! Rectangles in PDF user space.

use crate::object::Object;

/// An axis-aligned rectangle in PDF user space (origin bottom-left, y up).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// X coordinate of the lower-left corner
    pub x: f32,
    /// Y coordinate of the lower-left corner
    pub y: f32,
    /// Width of rectangle
    pub width: f32,
    /// Height of rectangle
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle from position and dimensions.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from two opposite corners, in any order.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_seal::geometry::Rect;
    ///
    /// let rect = Rect::from_points(110.0, 70.0, 10.0, 20.0);
    /// assert_eq!(rect.x, 10.0);
    /// assert_eq!(rect.y, 20.0);
    /// assert_eq!(rect.width, 100.0);
    /// assert_eq!(rect.height, 50.0);
    /// ```
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Read a `[llx lly urx ury]` array.
    pub fn from_pdf_array(obj: &Object) -> Option<Self> {
        let values: Vec<f32> = obj
            .as_array()?
            .iter()
            .filter_map(Object::as_number)
            .map(|v| v as f32)
            .collect();
        match values.as_slice() {
            [x0, y0, x1, y1] => Some(Self::from_points(*x0, *y0, *x1, *y1)),
            _ => None,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn bottom(&self) -> f32 {
        self.y
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// Compute the area of the rectangle.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// True when the rectangle encloses no area and therefore draws nothing.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// As a PDF `[llx lly urx ury]` array.
    pub fn to_pdf_array(&self) -> Object {
        Object::Array(
            [self.left(), self.bottom(), self.right(), self.top()]
                .iter()
                .map(|&v| number(v))
                .collect(),
        )
    }
}

/// Integer object when the value is whole, real otherwise.
fn number(v: f32) -> Object {
    if v.fract() == 0.0 && v.abs() < i32::MAX as f32 {
        Object::Integer(v as i64)
    } else {
        Object::Real(v as f64)
    }
}
