/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Geometry in flow-relative space.
//!
//! Logical values store no writing mode of their own; wherever the physical
//! interpretation matters, the writing mode is passed explicitly, together
//! with the size of the container that anchors the far edges.
//!
//! See CSS Writing Modes Level 3: <https://drafts.csswg.org/css-writing-modes/>

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use bitflags::bitflags;
use euclid::num::Zero;

pub type PhysicalPoint<T> = euclid::default::Point2D<T>;
pub type PhysicalRect<T> = euclid::default::Rect<T>;
pub type PhysicalSize<T> = euclid::default::Size2D<T>;

bitflags! {
    /// The writing mode of a box, reduced to the bits that affect the
    /// logical-to-physical mapping. The empty value is `horizontal-tb` with
    /// an `ltr` inline base direction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct WritingMode: u8 {
        const RTL = 1 << 0;
        const VERTICAL = 1 << 1;
        /// For vertical writing modes only: the block direction runs left to
        /// right (`vertical-lr`) rather than right to left (`vertical-rl`).
        const VERTICAL_LR = 1 << 2;
        /// For vertical writing modes only: line-over/line-under sides are
        /// inverted from block-start/block-end. Set for `sideways-lr`.
        const LINE_INVERTED = 1 << 3;
    }
}

impl WritingMode {
    #[inline]
    pub fn horizontal_tb() -> WritingMode {
        WritingMode::empty()
    }

    #[inline]
    pub fn is_vertical(self) -> bool {
        self.intersects(WritingMode::VERTICAL)
    }

    /// Assuming `is_vertical()`, does the block direction go left to right?
    #[inline]
    pub fn is_vertical_lr(self) -> bool {
        self.intersects(WritingMode::VERTICAL_LR)
    }

    /// Assuming `is_vertical()`, does the inline direction go top to bottom?
    #[inline]
    pub fn is_inline_tb(self) -> bool {
        // https://drafts.csswg.org/css-writing-modes-3/#logical-to-physical
        self.intersects(WritingMode::RTL) == self.intersects(WritingMode::LINE_INVERTED)
    }

    #[inline]
    pub fn is_bidi_ltr(self) -> bool {
        !self.intersects(WritingMode::RTL)
    }
}

impl fmt::Display for WritingMode {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        if self.is_vertical() {
            write!(formatter, "V")?;
            if self.is_vertical_lr() {
                write!(formatter, " LR")?;
            } else {
                write!(formatter, " RL")?;
            }
            if self.intersects(WritingMode::LINE_INVERTED) {
                write!(formatter, " Inverted")?;
            }
        } else {
            write!(formatter, "H")?;
        }
        if self.is_bidi_ltr() {
            write!(formatter, " LTR")
        } else {
            write!(formatter, " RTL")
        }
    }
}

/// A pair of coordinates or lengths on the inline and block axes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LogicalVec2<T> {
    pub inline: T,
    pub block: T,
}

impl<T: fmt::Debug> fmt::Debug for LogicalVec2<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "i{:?}×b{:?}", self.inline, self.block)
    }
}

impl<T: Zero> LogicalVec2<T> {
    #[inline]
    pub fn zero() -> Self {
        LogicalVec2 {
            inline: T::zero(),
            block: T::zero(),
        }
    }
}

impl<T: Copy + Sub<T, Output = T>> LogicalVec2<T> {
    /// The physical point this corresponds to when interpreted as a position
    /// within a container of the given physical size.
    #[inline]
    pub fn to_physical_point(
        self,
        mode: WritingMode,
        container_size: PhysicalSize<T>,
    ) -> PhysicalPoint<T> {
        if mode.is_vertical() {
            PhysicalPoint::new(
                if mode.is_vertical_lr() {
                    self.block
                } else {
                    container_size.width - self.block
                },
                if mode.is_inline_tb() {
                    self.inline
                } else {
                    container_size.height - self.inline
                },
            )
        } else {
            PhysicalPoint::new(
                if mode.is_bidi_ltr() {
                    self.inline
                } else {
                    container_size.width - self.inline
                },
                self.block,
            )
        }
    }
}

impl<T: Add<T, Output = T> + Copy> Add<LogicalVec2<T>> for LogicalVec2<T> {
    type Output = LogicalVec2<T>;

    #[inline]
    fn add(self, other: LogicalVec2<T>) -> Self::Output {
        LogicalVec2 {
            inline: self.inline + other.inline,
            block: self.block + other.block,
        }
    }
}

impl<T: Sub<T, Output = T> + Copy> Sub<LogicalVec2<T>> for LogicalVec2<T> {
    type Output = LogicalVec2<T>;

    #[inline]
    fn sub(self, other: LogicalVec2<T>) -> Self::Output {
        LogicalVec2 {
            inline: self.inline - other.inline,
            block: self.block - other.block,
        }
    }
}

impl<T: AddAssign<T> + Copy> AddAssign<LogicalVec2<T>> for LogicalVec2<T> {
    #[inline]
    fn add_assign(&mut self, other: LogicalVec2<T>) {
        self.inline += other.inline;
        self.block += other.block;
    }
}

impl<T: SubAssign<T> + Copy> SubAssign<LogicalVec2<T>> for LogicalVec2<T> {
    #[inline]
    fn sub_assign(&mut self, other: LogicalVec2<T>) {
        self.inline -= other.inline;
        self.block -= other.block;
    }
}

impl<T: Neg<Output = T> + Copy> Neg for LogicalVec2<T> {
    type Output = LogicalVec2<T>;

    #[inline]
    fn neg(self) -> Self::Output {
        LogicalVec2 {
            inline: -self.inline,
            block: -self.block,
        }
    }
}

/// Four logical sides of a box: margins, borders, padding, or offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogicalSides<T> {
    pub inline_start: T,
    pub inline_end: T,
    pub block_start: T,
    pub block_end: T,
}

impl<T: Zero> LogicalSides<T> {
    #[inline]
    pub fn zero() -> Self {
        LogicalSides {
            inline_start: T::zero(),
            inline_end: T::zero(),
            block_start: T::zero(),
            block_end: T::zero(),
        }
    }
}

impl<T: Add<T, Output = T> + Copy> LogicalSides<T> {
    #[inline]
    pub fn inline_sum(&self) -> T {
        self.inline_start + self.inline_end
    }

    #[inline]
    pub fn block_sum(&self) -> T {
        self.block_start + self.block_end
    }

    #[inline]
    pub fn sum(&self) -> LogicalVec2<T> {
        LogicalVec2 {
            inline: self.inline_sum(),
            block: self.block_sum(),
        }
    }

    /// The offset from a box's start corner to the start corner of its
    /// contents when these sides surround them.
    #[inline]
    pub fn start_offset(&self) -> LogicalVec2<T> {
        LogicalVec2 {
            inline: self.inline_start,
            block: self.block_start,
        }
    }
}

/// A rectangle in flow-relative dimensions.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LogicalRect<T> {
    pub start_corner: LogicalVec2<T>,
    pub size: LogicalVec2<T>,
}

impl<T: fmt::Debug> fmt::Debug for LogicalRect<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "Rect(i{:?}×b{:?} @ (i{:?},b{:?}))",
            self.size.inline, self.size.block, self.start_corner.inline, self.start_corner.block,
        )
    }
}

impl<T: Zero> LogicalRect<T> {
    #[inline]
    pub fn zero() -> Self {
        LogicalRect {
            start_corner: LogicalVec2::zero(),
            size: LogicalVec2::zero(),
        }
    }
}

impl<T: Copy + Add<T, Output = T>> LogicalRect<T> {
    #[inline]
    pub fn max_inline_position(&self) -> T {
        self.start_corner.inline + self.size.inline
    }

    #[inline]
    pub fn max_block_position(&self) -> T {
        self.start_corner.block + self.size.block
    }

    #[inline]
    pub fn translate(&self, offset: LogicalVec2<T>) -> Self {
        LogicalRect {
            start_corner: self.start_corner + offset,
            size: self.size,
        }
    }
}

impl<T: Copy + Add<T, Output = T> + Sub<T, Output = T>> LogicalRect<T> {
    /// The rectangle that additionally covers these sides, e.g. the margin
    /// box of a border box.
    #[inline]
    pub fn inflate(&self, sides: &LogicalSides<T>) -> Self {
        LogicalRect {
            start_corner: LogicalVec2 {
                inline: self.start_corner.inline - sides.inline_start,
                block: self.start_corner.block - sides.block_start,
            },
            size: LogicalVec2 {
                inline: self.size.inline + sides.inline_sum(),
                block: self.size.block + sides.block_sum(),
            },
        }
    }

    #[inline]
    pub fn to_physical(
        &self,
        mode: WritingMode,
        container_size: PhysicalSize<T>,
    ) -> PhysicalRect<T> {
        let (x, y, width, height);
        if mode.is_vertical() {
            width = self.size.block;
            height = self.size.inline;
            if mode.is_vertical_lr() {
                x = self.start_corner.block;
            } else {
                x = container_size.width - self.max_block_position();
            }
            if mode.is_inline_tb() {
                y = self.start_corner.inline;
            } else {
                y = container_size.height - self.max_inline_position();
            }
        } else {
            width = self.size.inline;
            height = self.size.block;
            y = self.start_corner.block;
            if mode.is_bidi_ltr() {
                x = self.start_corner.inline;
            } else {
                x = container_size.width - self.max_inline_position();
            }
        }
        PhysicalRect::new(PhysicalPoint::new(x, y), PhysicalSize::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use app_units::Au;

    use super::*;

    fn rect(i: i32, b: i32, isize: i32, bsize: i32) -> LogicalRect<Au> {
        LogicalRect {
            start_corner: LogicalVec2 {
                inline: Au(i),
                block: Au(b),
            },
            size: LogicalVec2 {
                inline: Au(isize),
                block: Au(bsize),
            },
        }
    }

    #[test]
    fn physical_mapping_horizontal() {
        let container = PhysicalSize::new(Au(1000), Au(500));
        let r = rect(100, 20, 300, 40);

        let ltr = r.to_physical(WritingMode::horizontal_tb(), container);
        assert_eq!(ltr.origin, PhysicalPoint::new(Au(100), Au(20)));
        assert_eq!(ltr.size, PhysicalSize::new(Au(300), Au(40)));

        let rtl = r.to_physical(WritingMode::RTL, container);
        assert_eq!(rtl.origin, PhysicalPoint::new(Au(600), Au(20)));

        // A point maps the same way the rect origin does, except that in RTL
        // the far corner anchors it.
        assert_eq!(
            r.start_corner
                .to_physical_point(WritingMode::horizontal_tb(), container),
            ltr.origin
        );
        assert_eq!(
            r.start_corner.to_physical_point(WritingMode::RTL, container),
            PhysicalPoint::new(Au(900), Au(20))
        );
    }

    #[test]
    fn physical_mapping_vertical() {
        let container = PhysicalSize::new(Au(500), Au(1000));
        let r = rect(100, 20, 300, 40);

        let vertical_rl = r.to_physical(WritingMode::VERTICAL, container);
        assert_eq!(vertical_rl.origin, PhysicalPoint::new(Au(440), Au(100)));
        assert_eq!(vertical_rl.size, PhysicalSize::new(Au(40), Au(300)));

        let vertical_lr =
            r.to_physical(WritingMode::VERTICAL | WritingMode::VERTICAL_LR, container);
        assert_eq!(vertical_lr.origin, PhysicalPoint::new(Au(20), Au(100)));
    }

    #[test]
    fn inflate_covers_sides() {
        let sides = LogicalSides {
            inline_start: Au(5),
            inline_end: Au(7),
            block_start: Au(1),
            block_end: Au(3),
        };
        let margin_box = rect(100, 10, 50, 20).inflate(&sides);
        assert_eq!(margin_box, rect(95, 9, 62, 24));
        assert_eq!(
            sides.sum(),
            LogicalVec2 {
                inline: Au(12),
                block: Au(4),
            }
        );
    }
}
