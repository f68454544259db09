//! Point coordinates
//!
//! A point is one task of the graph: an index at a timestep.

use std::fmt;

/// `(timestep, index)` coordinate of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub timestep: i64,
    pub index: i64,
}

impl Point {
    /// Create a point.
    ///
    /// # Examples
    ///
    /// ```
    /// use taskbench_serial::runtime::resolver::Point;
    ///
    /// let p = Point::new(3, 1);
    /// assert_eq!(p.timestep, 3);
    /// assert_eq!(p.index, 1);
    /// ```
    #[inline]
    pub fn new(
        timestep: i64,
        index: i64,
    ) -> Self {
        Self { timestep, index }
    }

    /// The same index one timestep earlier.
    #[inline]
    pub fn previous(&self) -> Self {
        Self {
            timestep: self.timestep - 1,
            index: self.index,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "(t={}, x={})", self.timestep, self.index)
    }
}
