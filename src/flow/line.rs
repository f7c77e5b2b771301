/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-line bookkeeping shared between block reflow and inline layout.

use app_units::Au;
use bitflags::bitflags;
use smallvec::SmallVec;

use crate::cell::ArcRefCell;
use crate::flow::float::FloatFrame;
use crate::flow::CollapsedMargin;
use crate::geom::{LogicalRect, WritingMode};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct LineFlags: u8 {
        /// The line wraps a single block-level box rather than inline
        /// content.
        const BLOCK = 1 << 0;
        /// The line has no content that would affect layout (only
        /// whitespace, empty inlines, or nothing at all).
        const EMPTY = 1 << 1;
        /// At least one float anchored on this line was pushed to the next
        /// fragment; the line must be dirtied if reflowed incrementally.
        const HAD_FLOAT_PUSHED = 1 << 2;
    }
}

/// What block reflow records about one laid-out line: enough to replay float
/// placement and margin collapsing when reflow resumes at this line instead
/// of at the top of the block.
#[derive(Debug)]
pub struct LineBox {
    flags: LineFlags,
    /// Floats anchored on this line. For a block line these are the floats
    /// the child block placed, so that recovery can replay them without
    /// descending into the child.
    pub floats: SmallVec<[ArcRefCell<FloatFrame>; 2]>,
    /// The block-end margin this line carried out, collapsed with whatever
    /// its content carried.
    pub carried_out_b_end_margin: CollapsedMargin,
}

impl LineBox {
    pub fn new_inline(is_empty: bool) -> Self {
        let mut flags = LineFlags::empty();
        if is_empty {
            flags |= LineFlags::EMPTY;
        }
        LineBox {
            flags,
            floats: SmallVec::new(),
            carried_out_b_end_margin: CollapsedMargin::zero(),
        }
    }

    pub fn new_block(carried_out_b_end_margin: CollapsedMargin) -> Self {
        LineBox {
            flags: LineFlags::BLOCK,
            floats: SmallVec::new(),
            carried_out_b_end_margin,
        }
    }

    #[inline]
    pub fn is_block(&self) -> bool {
        self.flags.contains(LineFlags::BLOCK)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.contains(LineFlags::EMPTY)
    }

    #[inline]
    pub fn has_floats(&self) -> bool {
        !self.floats.is_empty()
    }

    pub fn set_had_float_pushed(&mut self) {
        self.flags |= LineFlags::HAD_FLOAT_PUSHED;
    }

    #[inline]
    pub fn had_float_pushed(&self) -> bool {
        self.flags.contains(LineFlags::HAD_FLOAT_PUSHED)
    }
}

/// The view of the in-progress line that float placement talks back to.
/// Implemented by the inline layout engine.
pub trait LineLayout {
    /// Whether nothing has been placed on the line yet. An empty line
    /// imposes no inline-size constraint on a float encountered within it.
    fn line_is_empty(&self) -> bool;

    /// A float was just placed; this is the new band of space available to
    /// the rest of the line.
    fn update_band(&mut self, mode: WritingMode, available_space: &LogicalRect<Au>);

    /// A float anchored on this line was pushed to the next fragment.
    fn set_had_float_pushed(&mut self);
}
