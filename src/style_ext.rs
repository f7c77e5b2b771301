/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Resolved style values consumed by block and float layout.
//!
//! Style resolution happens upstream; what arrives here are computed values,
//! already reduced to the handful of properties this engine reads. Physical
//! `left`/`right` values are mapped to flow-relative sides through the
//! containing block's writing mode at the point of use.

use app_units::Au;

use crate::geom::{LogicalSides, WritingMode};

/// The computed value of `float`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FloatProperty {
    None,
    Left,
    Right,
    InlineStart,
    InlineEnd,
}

/// Whether a float is aligned to the inline-start or inline-end side of its
/// containing block.
///
/// See CSS 2.1 § 9.5.1: <https://www.w3.org/TR/CSS2/visuren.html#float-position>
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FloatSide {
    InlineStart,
    InlineEnd,
}

impl FloatSide {
    pub fn from_float_property(
        float: FloatProperty,
        container_writing_mode: WritingMode,
    ) -> Option<FloatSide> {
        Some(match float {
            FloatProperty::None => return None,
            FloatProperty::InlineStart => FloatSide::InlineStart,
            FloatProperty::InlineEnd => FloatSide::InlineEnd,
            FloatProperty::Left if container_writing_mode.is_bidi_ltr() => FloatSide::InlineStart,
            FloatProperty::Left => FloatSide::InlineEnd,
            FloatProperty::Right if container_writing_mode.is_bidi_ltr() => FloatSide::InlineEnd,
            FloatProperty::Right => FloatSide::InlineStart,
        })
    }
}

/// The computed value of `clear`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClearProperty {
    None,
    Left,
    Right,
    Both,
    InlineStart,
    InlineEnd,
}

/// Which side or sides a box clears, in flow-relative terms.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Clear {
    None,
    InlineStart,
    InlineEnd,
    Both,
}

impl Clear {
    pub fn from_clear_property(
        clear: ClearProperty,
        container_writing_mode: WritingMode,
    ) -> Clear {
        match clear {
            ClearProperty::None => Clear::None,
            ClearProperty::Both => Clear::Both,
            ClearProperty::InlineStart => Clear::InlineStart,
            ClearProperty::InlineEnd => Clear::InlineEnd,
            ClearProperty::Left if container_writing_mode.is_bidi_ltr() => Clear::InlineStart,
            ClearProperty::Left => Clear::InlineEnd,
            ClearProperty::Right if container_writing_mode.is_bidi_ltr() => Clear::InlineEnd,
            ClearProperty::Right => Clear::InlineStart,
        }
    }

    /// Whether clearing this side also clears floats on `side`.
    pub fn covers(self, side: FloatSide) -> bool {
        match self {
            Clear::None => false,
            Clear::Both => true,
            Clear::InlineStart => side == FloatSide::InlineStart,
            Clear::InlineEnd => side == FloatSide::InlineEnd,
        }
    }
}

/// The computed value of `break-inside`, reduced to what float placement
/// cares about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BreakWithin {
    Auto,
    Avoid,
}

/// The computed value of `-moz-float-edge` / `float-edge`: which box of a
/// float-avoiding block must stay clear of float margin boxes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FloatEdge {
    ContentBox,
    MarginBox,
}

/// The computed value of `box-decoration-break`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoxDecorationBreak {
    Slice,
    Clone,
}

/// The computed value of `shape-outside`, reduced to the form float-area
/// queries consume: either the margin box, or a rectangular area expressed
/// as insets from the float's margin box. Image and polygon shapes are
/// rasterized to such insets by the style system before reaching layout.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeOutside {
    None,
    Inset(LogicalSides<Au>),
}

impl ShapeOutside {
    pub fn is_none(&self) -> bool {
        matches!(self, ShapeOutside::None)
    }
}

/// The resolved style of one floating box.
#[derive(Clone, Debug)]
pub struct FloatStyle {
    pub float: FloatProperty,
    pub clear: ClearProperty,
    pub break_inside: BreakWithin,
    pub shape_outside: ShapeOutside,
    pub shape_margin: Au,
    pub shape_image_threshold: f32,
}

impl FloatStyle {
    /// A plain `float: left` style with no clearing and no shape.
    pub fn left() -> Self {
        FloatStyle {
            float: FloatProperty::Left,
            clear: ClearProperty::None,
            break_inside: BreakWithin::Auto,
            shape_outside: ShapeOutside::None,
            shape_margin: Au(0),
            shape_image_threshold: 0.0,
        }
    }

    /// A plain `float: right` style with no clearing and no shape.
    pub fn right() -> Self {
        FloatStyle {
            float: FloatProperty::Right,
            ..FloatStyle::left()
        }
    }

    pub fn used_float(&self, container_writing_mode: WritingMode) -> FloatSide {
        FloatSide::from_float_property(self.float, container_writing_mode)
            .expect("style of a float frame must have a non-none float value")
    }

    pub fn used_clear(&self, container_writing_mode: WritingMode) -> Clear {
        Clear::from_clear_property(self.clear, container_writing_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_values_follow_bidi_direction() {
        let ltr = WritingMode::horizontal_tb();
        let rtl = WritingMode::RTL;

        assert_eq!(
            FloatSide::from_float_property(FloatProperty::Left, ltr),
            Some(FloatSide::InlineStart)
        );
        assert_eq!(
            FloatSide::from_float_property(FloatProperty::Left, rtl),
            Some(FloatSide::InlineEnd)
        );
        assert_eq!(
            Clear::from_clear_property(ClearProperty::Right, ltr),
            Clear::InlineEnd
        );
        assert_eq!(
            Clear::from_clear_property(ClearProperty::Right, rtl),
            Clear::InlineStart
        );
    }

    #[test]
    fn clear_coverage() {
        assert!(Clear::Both.covers(FloatSide::InlineStart));
        assert!(Clear::Both.covers(FloatSide::InlineEnd));
        assert!(Clear::InlineStart.covers(FloatSide::InlineStart));
        assert!(!Clear::InlineStart.covers(FloatSide::InlineEnd));
        assert!(!Clear::None.covers(FloatSide::InlineStart));
    }
}
