/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The float manager: the per-block-formatting-context registry of placed
//! floats.
//!
//! Every float that has been placed in the current formatting context is
//! recorded here, and the manager answers the two questions block and inline
//! layout keep asking: "how much inline room is there at this block
//! position" and "where does clearing this side land". All coordinates are
//! relative to the formatting context root; a translation is maintained so
//! that nested blocks can talk to the manager in their own coordinate space.
//!
//! See CSS 2.1 § 9.5: <https://www.w3.org/TR/CSS2/visuren.html#floats>

use std::cmp::{max, min};

use app_units::{Au, MAX_AU, MIN_AU};
use euclid::num::Zero;
use log::trace;

use crate::cell::ArcRefCell;
use crate::geom::{
    LogicalRect, LogicalSides, LogicalVec2, PhysicalRect, PhysicalSize, WritingMode,
};
use crate::style_ext::{Clear, FloatSide, FloatStyle, ShapeOutside};

/// Ink and scrollable overflow, in physical coordinates relative to some
/// origin (a box's own border-box origin, or its parent's origin once the
/// box has been positioned).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverflowAreas {
    pub ink: PhysicalRect<Au>,
    pub scrollable: PhysicalRect<Au>,
}

impl OverflowAreas {
    #[inline]
    pub fn zero() -> Self {
        OverflowAreas {
            ink: PhysicalRect::zero(),
            scrollable: PhysicalRect::zero(),
        }
    }

    #[inline]
    pub fn from_rect(rect: PhysicalRect<Au>) -> Self {
        OverflowAreas {
            ink: rect,
            scrollable: rect,
        }
    }

    pub fn union_with(&mut self, other: &OverflowAreas) {
        self.ink = self.ink.union(&other.ink);
        self.scrollable = self.scrollable.union(&other.scrollable);
    }

    #[inline]
    pub fn translate(&self, by: euclid::default::Vector2D<Au>) -> Self {
        OverflowAreas {
            ink: self.ink.translate(by),
            scrollable: self.scrollable.translate(by),
        }
    }
}

/// The last `shape-outside` / `shape-margin` / `shape-image-threshold`
/// triple applied to a float. A shape can change the float's exclusion area
/// without moving the float's own box, so region equality alone is not
/// enough to decide whether the float area needs repainting.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ShapeInvalidationData {
    shape_outside: ShapeOutside,
    shape_margin: Au,
    shape_image_threshold: f32,
}

impl ShapeInvalidationData {
    pub(crate) fn is_needed(style: &FloatStyle) -> bool {
        !style.shape_outside.is_none()
    }

    fn from_style(style: &FloatStyle) -> Self {
        debug_assert!(Self::is_needed(style));
        ShapeInvalidationData {
            shape_outside: style.shape_outside.clone(),
            shape_margin: style.shape_margin,
            shape_image_threshold: style.shape_image_threshold,
        }
    }

    fn matches(&self, style: &FloatStyle) -> bool {
        self.shape_outside == style.shape_outside &&
            self.shape_margin == style.shape_margin &&
            self.shape_image_threshold == style.shape_image_threshold
    }
}

/// A floating box, with its resolved style and the geometry the placement
/// algorithm reads and writes. The surrounding box tree is out of scope;
/// this record carries exactly what float placement needs to know about the
/// frame.
#[derive(Debug)]
pub struct FloatFrame {
    pub style: FloatStyle,
    /// Resolved margin. Placement zeroes the block-start margin of
    /// continuations and the block-end margin of incompletely laid out
    /// floats; margins only apply to one fragment.
    pub margin: LogicalSides<Au>,
    /// Border-box inline size from the computed style, or `MAX_AU` when only
    /// reflow can determine it: first-letter floats, and orthogonal floats
    /// whose auto block-size becomes an inline size in this container.
    pub computed_inline_size: Au,
    /// Relative-positioning offset applied to the final origin.
    pub relative_offset: LogicalVec2<Au>,
    /// Whether this is a floating first-letter frame.
    pub is_letter: bool,
    /// Whether this frame continues a float split by an earlier fragment.
    pub has_prev_in_flow: bool,
    /// Whether this float has been split and continues in a later fragment.
    pub has_next_in_flow: bool,
    /// Set once the float has been moved past a fragmentation break.
    pub is_pushed: bool,
    /// Border-box origin relative to the containing block, written by
    /// placement.
    pub position: LogicalVec2<Au>,
    /// Border-box size, written by the most recent reflow of this float.
    pub size: LogicalVec2<Au>,
    /// Overflow relative to this float's border-box origin.
    pub overflow: OverflowAreas,
    /// The margin-box region last registered with the float manager, kept
    /// across reflow passes so that damage can be derived from how the
    /// region moved.
    stored_region: Option<LogicalRect<Au>>,
    shape_invalidation: Option<ShapeInvalidationData>,
}

impl FloatFrame {
    pub fn new(style: FloatStyle, margin: LogicalSides<Au>, computed_inline_size: Au) -> Self {
        FloatFrame {
            style,
            margin,
            computed_inline_size,
            relative_offset: LogicalVec2::zero(),
            is_letter: false,
            has_prev_in_flow: false,
            has_next_in_flow: false,
            is_pushed: false,
            position: LogicalVec2::zero(),
            size: LogicalVec2::zero(),
            overflow: OverflowAreas::zero(),
            stored_region: None,
            shape_invalidation: None,
        }
    }

    /// The inline size the float's margin box will occupy, or `MAX_AU` if
    /// that is only knowable by reflowing the float.
    pub fn margin_inline_size(&self) -> Au {
        if self.computed_inline_size == MAX_AU {
            return MAX_AU;
        }
        self.computed_inline_size + self.margin.inline_sum()
    }

    /// The margin-box rectangle around the current border box, using the
    /// given margins. Negative sizes collapse to zero so the registered
    /// region stays well formed under negative margins.
    pub fn margin_box_region(&self, margin: &LogicalSides<Au>) -> LogicalRect<Au> {
        let border_rect = LogicalRect {
            start_corner: self.position,
            size: self.size,
        };
        let mut region = border_rect.inflate(margin);
        region.size.inline = max(region.size.inline, Au::zero());
        region.size.block = max(region.size.block, Au::zero());
        region
    }

    /// The region this float occupies for float-manager purposes: the last
    /// stored one, or the margin box around its current geometry.
    pub fn region(&self) -> LogicalRect<Au> {
        self.stored_region
            .unwrap_or_else(|| self.margin_box_region(&self.margin))
    }

    pub fn store_region(&mut self, region: LogicalRect<Au>) {
        self.stored_region = Some(region);
    }

    /// Slide the float along the block axis, e.g. when the line that anchors
    /// it is moved by an incremental reflow.
    pub fn move_block_position_by(&mut self, delta: Au) {
        self.position.block += delta;
        if let Some(region) = self.stored_region.as_mut() {
            region.start_corner.block += delta;
        }
    }

    /// Whether the shape triple changed since the float was last placed.
    pub(crate) fn shape_invalidation_differs(&self) -> bool {
        let needed = ShapeInvalidationData::is_needed(&self.style);
        match &self.shape_invalidation {
            None => needed,
            Some(data) => !needed || !data.matches(&self.style),
        }
    }

    pub(crate) fn refresh_shape_invalidation(&mut self) {
        if ShapeInvalidationData::is_needed(&self.style) {
            self.shape_invalidation = Some(ShapeInvalidationData::from_style(&self.style));
        } else {
            self.shape_invalidation = None;
        }
    }

    /// Overflow areas expressed relative to the containing block, after the
    /// float has been positioned. A frame's overflow always contains its own
    /// border box.
    pub fn overflow_relative_to_parent(
        &self,
        mode: WritingMode,
        container_size: PhysicalSize<Au>,
    ) -> OverflowAreas {
        let border_rect = LogicalRect {
            start_corner: self.position,
            size: self.size,
        }
        .to_physical(mode, container_size);
        let mut areas = OverflowAreas::from_rect(border_rect);
        areas.union_with(&self.overflow.translate(border_rect.origin.to_vector()));
        areas
    }
}

/// Whether a flow-area query asks for a thin band at a block position, or
/// for the worst-case inline room over a known block extent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BandInfoType {
    /// The band that starts exactly at the given block position and extends
    /// until the set of intruding floats changes.
    BandFromPoint,
    /// The inline space that remains available over the whole given block
    /// extent, for boxes that must avoid floats across their full height.
    WidthWithinHeight,
}

/// Which exclusion area of each float a flow-area query measures against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShapeType {
    /// The float's margin box. Floats themselves are placed against margin
    /// boxes regardless of `shape-outside`.
    Margin,
    /// The `shape-outside` area, when the float has one.
    ShapeOutside,
}

/// The result of a flow-area query: the maximal band free of float
/// intrusion at a block position.
#[derive(Clone, Copy, Debug)]
pub struct FlowAreaRect {
    pub rect: LogicalRect<Au>,
    has_floats: bool,
    isize_is_actually_negative: bool,
}

impl FlowAreaRect {
    /// Whether any float intrudes into this band. A band narrowed by a
    /// zero-width float still reports floats here; clearing past zero-width
    /// floats depends on the distinction.
    #[inline]
    pub fn has_floats(&self) -> bool {
        self.has_floats
    }

    /// The inline size is clamped to be non-negative, but callers sizing a
    /// float-avoiding box need to know when floats from both sides crossed
    /// each other, because then nothing fits no matter how narrow.
    #[inline]
    pub fn isize_is_actually_negative(&self) -> bool {
        self.isize_is_actually_negative
    }
}

/// One placed float, in float-manager coordinates.
#[derive(Debug)]
struct FloatInfo {
    frame: ArcRefCell<FloatFrame>,
    /// Margin-box region.
    region: LogicalRect<Au>,
    /// The exclusion area used for `ShapeType::ShapeOutside` queries; equal
    /// to `region` when the float has no shape.
    shape_region: LogicalRect<Au>,
    side: FloatSide,
    /// Running maxima of the block-end edges of inline-start (resp.
    /// inline-end) floats up to and including this one. Keeping them per
    /// entry means truncating to a checkpoint leaves clear queries O(1).
    inline_start_b_end: Au,
    inline_end_b_end: Au,
}

/// A checkpoint of the float manager, restorable while no earlier
/// checkpoint has been popped.
#[derive(Clone, Debug)]
pub struct SavedState {
    float_count: usize,
    translation: LogicalVec2<Au>,
    pushed_inline_start_float_past_break: bool,
    pushed_inline_end_float_past_break: bool,
}

/// A handle to a checkpoint on the manager's state stack. Checkpoints obey
/// stack discipline: the most recently pushed one must be popped or
/// forgotten first.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StateKey(usize);

/// A set of closed block-axis intervals, kept sorted and coalesced. Used to
/// report which block-axis range of the formatting context needs repainting
/// after float regions changed.
#[derive(Clone, Debug, Default)]
pub struct IntervalSet {
    intervals: Vec<(Au, Au)>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[(Au, Au)] {
        &self.intervals
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    pub fn include(&mut self, start: Au, end: Au) {
        debug_assert!(start <= end, "interval ends before it starts");
        let first = self
            .intervals
            .partition_point(|&(_, existing_end)| existing_end < start);
        let last = self
            .intervals
            .partition_point(|&(existing_start, _)| existing_start <= end);
        if first == last {
            self.intervals.insert(first, (start, end));
            return;
        }
        let merged = (
            min(start, self.intervals[first].0),
            max(end, self.intervals[last - 1].1),
        );
        self.intervals.splice(first..last, [merged]);
    }

    pub fn intersects(&self, start: Au, end: Au) -> bool {
        let first = self
            .intervals
            .partition_point(|&(_, existing_end)| existing_end < start);
        self.intervals
            .get(first)
            .is_some_and(|&(existing_start, _)| existing_start <= end)
    }
}

/// The registry of placed floats for one block formatting context.
///
/// The formatting context root owns the manager; descendant blocks reach it
/// by mutable reference for the duration of their own reflow, so the live
/// state is shared down the call stack rather than copied.
#[derive(Debug)]
pub struct FloatManager {
    writing_mode: WritingMode,
    floats: Vec<FloatInfo>,
    translation: LogicalVec2<Au>,
    pushed_inline_start_float_past_break: bool,
    pushed_inline_end_float_past_break: bool,
    checkpoints: Vec<SavedState>,
    damage: IntervalSet,
}

impl FloatManager {
    pub fn new(writing_mode: WritingMode) -> Self {
        FloatManager {
            writing_mode,
            floats: Vec::new(),
            translation: LogicalVec2::zero(),
            pushed_inline_start_float_past_break: false,
            pushed_inline_end_float_past_break: false,
            checkpoints: Vec::new(),
            damage: IntervalSet::new(),
        }
    }

    #[inline]
    pub fn writing_mode(&self) -> WritingMode {
        self.writing_mode
    }

    /// Move the origin that incoming coordinates are relative to. Nested
    /// blocks translate to their own origin on entry and back out on exit.
    pub fn translate(&mut self, delta: LogicalVec2<Au>) {
        self.translation += delta;
    }

    #[inline]
    pub fn translation(&self) -> LogicalVec2<Au> {
        self.translation
    }

    #[inline]
    pub fn has_any_floats(&self) -> bool {
        !self.floats.is_empty()
    }

    /// The frames of every placed float, in placement order.
    pub fn placed_floats(&self) -> impl Iterator<Item = &ArcRefCell<FloatFrame>> {
        self.floats.iter().map(|info| &info.frame)
    }

    /// The block-start of the most recently placed float, or `MIN_AU` when
    /// no float has been placed. Because floats preserve source order along
    /// the block axis (CSS 2.1 § 9.5.1 rule 2), this is also the lowest
    /// block-start among all placed floats.
    pub fn lowest_float_b_start(&self) -> Au {
        match self.floats.last() {
            None => MIN_AU,
            Some(info) => info.region.start_corner.block - self.translation.block,
        }
    }

    /// Register a float's final margin-box region. The region must not start
    /// above any already-placed float. The frame is passed both as the
    /// shared handle to keep and as the borrow the caller already holds.
    pub fn add_float(
        &mut self,
        frame_cell: &ArcRefCell<FloatFrame>,
        frame: &FloatFrame,
        region: LogicalRect<Au>,
        side: FloatSide,
    ) {
        let mut stored = region.translate(self.translation);
        stored.size.inline = max(stored.size.inline, Au::zero());
        stored.size.block = max(stored.size.block, Au::zero());
        debug_assert!(
            self.floats
                .last()
                .is_none_or(|last| stored.start_corner.block >= last.region.start_corner.block),
            "float ordering violated: new float starts above an earlier one"
        );

        let shape_region = Self::shape_region_for(frame, stored);
        let (mut inline_start_b_end, mut inline_end_b_end) = match self.floats.last() {
            None => (MIN_AU, MIN_AU),
            Some(last) => (last.inline_start_b_end, last.inline_end_b_end),
        };
        let b_end = stored.max_block_position();
        match side {
            FloatSide::InlineStart => inline_start_b_end = max(inline_start_b_end, b_end),
            FloatSide::InlineEnd => inline_end_b_end = max(inline_end_b_end, b_end),
        }

        trace!(
            "FloatManager::add_float: side={:?} region={:?} (translated {:?})",
            side,
            region,
            stored
        );
        self.floats.push(FloatInfo {
            frame: frame_cell.clone(),
            region: stored,
            shape_region,
            side,
            inline_start_b_end,
            inline_end_b_end,
        });
    }

    /// The exclusion area of a float: its margin box, reduced by the
    /// `shape-outside` insets (each grown back out by `shape-margin`, and
    /// never extending past the margin box).
    fn shape_region_for(frame: &FloatFrame, margin_region: LogicalRect<Au>) -> LogicalRect<Au> {
        let insets = match &frame.style.shape_outside {
            ShapeOutside::None => return margin_region,
            ShapeOutside::Inset(insets) => insets,
        };
        let shape_margin = frame.style.shape_margin;
        let effective = LogicalSides {
            inline_start: max(insets.inline_start - shape_margin, Au::zero()),
            inline_end: max(insets.inline_end - shape_margin, Au::zero()),
            block_start: max(insets.block_start - shape_margin, Au::zero()),
            block_end: max(insets.block_end - shape_margin, Au::zero()),
        };
        let mut region = LogicalRect {
            start_corner: LogicalVec2 {
                inline: margin_region.start_corner.inline + effective.inline_start,
                block: margin_region.start_corner.block + effective.block_start,
            },
            size: LogicalVec2 {
                inline: margin_region.size.inline - effective.inline_sum(),
                block: margin_region.size.block - effective.block_sum(),
            },
        };
        region.size.inline = max(region.size.inline, Au::zero());
        region.size.block = max(region.size.block, Au::zero());
        region
    }

    /// The maximal band free of float intrusion at `b_coord`.
    ///
    /// With `BandInfoType::BandFromPoint` the returned block size is the
    /// extent over which the band stays valid; with `WidthWithinHeight` the
    /// band accounts for every float intersecting the given `b_size` and the
    /// block size is returned unchanged. The inline size is clamped to zero
    /// when floats from both sides cross; `isize_is_actually_negative`
    /// records that this happened.
    ///
    /// When `state` refers to a checkpoint, only floats that were already
    /// placed at that checkpoint are considered.
    pub fn get_flow_area(
        &self,
        mode: WritingMode,
        b_coord: Au,
        band_kind: BandInfoType,
        b_size: Au,
        content_area: LogicalRect<Au>,
        shape_type: ShapeType,
        state: Option<StateKey>,
    ) -> FlowAreaRect {
        debug_assert!(mode == self.writing_mode, "bad writing mode for flow area query");
        debug_assert!(b_size >= Au::zero(), "flow area queried with negative block size");

        let float_count = match state {
            None => self.floats.len(),
            Some(key) => self.checkpoints[key.0].float_count,
        };
        let b_start = b_coord + self.translation.block;
        let b_end = if b_size == MAX_AU {
            MAX_AU
        } else {
            b_start + b_size
        };

        let content_i_start = content_area.start_corner.inline + self.translation.inline;
        let content_i_end = content_area.max_inline_position() + self.translation.inline;
        let mut inline_start = content_i_start;
        let mut inline_end = content_i_end;
        let mut band_b_end = b_end;
        let mut has_floats = false;

        for info in &self.floats[..float_count] {
            let region = match shape_type {
                ShapeType::Margin => info.region,
                ShapeType::ShapeOutside => info.shape_region,
            };
            let region_b_start = region.start_corner.block;
            let region_b_end = region.max_block_position();
            match band_kind {
                BandInfoType::BandFromPoint => {
                    if region_b_end <= b_start {
                        continue;
                    }
                    if region_b_start > b_start {
                        // A float below the band origin only limits how far
                        // down the band stays valid.
                        if region_b_start < band_b_end {
                            band_b_end = region_b_start;
                        }
                        continue;
                    }
                    if region_b_end < band_b_end {
                        band_b_end = region_b_end;
                    }
                },
                BandInfoType::WidthWithinHeight => {
                    if region_b_end <= b_start || region_b_start >= b_end {
                        continue;
                    }
                },
            }
            match info.side {
                FloatSide::InlineStart => {
                    inline_start = max(inline_start, region.max_inline_position());
                },
                FloatSide::InlineEnd => {
                    inline_end = min(inline_end, region.start_corner.inline);
                },
            }
            has_floats = true;
        }

        let inline_size = inline_end - inline_start;
        let isize_is_actually_negative = inline_size < Au::zero();
        let band_b_size = match band_kind {
            BandInfoType::BandFromPoint => {
                if band_b_end == MAX_AU {
                    MAX_AU
                } else {
                    band_b_end - b_start
                }
            },
            BandInfoType::WidthWithinHeight => b_size,
        };
        FlowAreaRect {
            rect: LogicalRect {
                start_corner: LogicalVec2 {
                    inline: inline_start - self.translation.inline,
                    block: b_coord,
                },
                size: LogicalVec2 {
                    inline: max(inline_size, Au::zero()),
                    block: band_b_size,
                },
            },
            has_floats,
            isize_is_actually_negative,
        }
    }

    /// The block coordinate at which a box clearing the given side(s) may be
    /// placed: never less than `b_coord`, and past the block-end edge of
    /// every float on the cleared side(s).
    pub fn clear_floats(&self, b_coord: Au, clear: Clear) -> Au {
        let last = match self.floats.last() {
            None => return b_coord,
            Some(last) => last,
        };
        let cleared_b_end = match clear {
            Clear::None => return b_coord,
            Clear::InlineStart => last.inline_start_b_end,
            Clear::InlineEnd => last.inline_end_b_end,
            Clear::Both => max(last.inline_start_b_end, last.inline_end_b_end),
        };
        max(b_coord, cleared_b_end - self.translation.block)
    }

    /// Whether clearing the given side(s) cannot complete on this fragment
    /// because a float of a cleared side has been pushed past the break.
    pub fn clear_continues(&self, clear: Clear) -> bool {
        (clear.covers(FloatSide::InlineStart) && self.pushed_inline_start_float_past_break) ||
            (clear.covers(FloatSide::InlineEnd) && self.pushed_inline_end_float_past_break)
    }

    /// Record that a float of the given side was pushed past a fragmentation
    /// break; until the manager is reset for the next fragment, clears on
    /// that side report "continues" so no later float lands above the pushed
    /// one.
    pub fn set_pushed_float_past_break(&mut self, side: FloatSide) {
        match side {
            FloatSide::InlineStart => self.pushed_inline_start_float_past_break = true,
            FloatSide::InlineEnd => self.pushed_inline_end_float_past_break = true,
        }
    }

    /// Take a checkpoint of the current state. The checkpoint must later be
    /// either popped (restoring the state) or forgotten (committing all
    /// floats placed since), in LIFO order.
    pub fn push_state(&mut self) -> StateKey {
        self.checkpoints.push(SavedState {
            float_count: self.floats.len(),
            translation: self.translation,
            pushed_inline_start_float_past_break: self.pushed_inline_start_float_past_break,
            pushed_inline_end_float_past_break: self.pushed_inline_end_float_past_break,
        });
        StateKey(self.checkpoints.len() - 1)
    }

    /// Restore the state saved at `key`, removing every float placed since.
    pub fn pop_state(&mut self, key: StateKey) {
        debug_assert_eq!(
            key.0 + 1,
            self.checkpoints.len(),
            "float manager checkpoints popped out of order"
        );
        let state = self.checkpoints.remove(key.0);
        self.floats.truncate(state.float_count);
        self.translation = state.translation;
        self.pushed_inline_start_float_past_break = state.pushed_inline_start_float_past_break;
        self.pushed_inline_end_float_past_break = state.pushed_inline_end_float_past_break;
    }

    /// Discard the checkpoint at `key`, keeping all floats placed since.
    pub fn forget_state(&mut self, key: StateKey) {
        debug_assert_eq!(
            key.0 + 1,
            self.checkpoints.len(),
            "float manager checkpoints forgotten out of order"
        );
        self.checkpoints.remove(key.0);
    }

    /// Record a block-axis range whose float geometry changed. This is an
    /// output side channel for repaint; it does not affect layout.
    pub fn include_in_damage(&mut self, b_start: Au, b_end: Au) {
        self.damage.include(
            b_start + self.translation.block,
            b_end + self.translation.block,
        );
    }

    pub fn damage(&self) -> &IntervalSet {
        &self.damage
    }

    pub fn take_damage(&mut self) -> IntervalSet {
        std::mem::take(&mut self.damage)
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;

    fn content_area(isize: i32, bsize: Au) -> LogicalRect<Au> {
        LogicalRect {
            start_corner: LogicalVec2::zero(),
            size: LogicalVec2 {
                inline: Au(isize),
                block: bsize,
            },
        }
    }

    fn region(i: i32, b: i32, isize: i32, bsize: i32) -> LogicalRect<Au> {
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

    fn frame(style: FloatStyle) -> ArcRefCell<FloatFrame> {
        ArcRefCell::new(FloatFrame::new(style, LogicalSides::zero(), Au(0)))
    }

    fn add(manager: &mut FloatManager, style: FloatStyle, r: LogicalRect<Au>, side: FloatSide) {
        let cell = frame(style);
        manager.add_float(&cell, &cell.borrow(), r, side);
    }

    fn manager_with(regions: &[(LogicalRect<Au>, FloatSide)]) -> FloatManager {
        let mut manager = FloatManager::new(WritingMode::horizontal_tb());
        for (r, side) in regions {
            let style = match side {
                FloatSide::InlineStart => FloatStyle::left(),
                FloatSide::InlineEnd => FloatStyle::right(),
            };
            add(&mut manager, style, *r, *side);
        }
        manager
    }

    fn band_at(manager: &FloatManager, b: Au) -> FlowAreaRect {
        manager.get_flow_area(
            WritingMode::horizontal_tb(),
            b,
            BandInfoType::BandFromPoint,
            MAX_AU,
            content_area(400 * 60, MAX_AU),
            ShapeType::Margin,
            None,
        )
    }

    #[test]
    fn empty_manager_returns_full_band() {
        let manager = manager_with(&[]);
        let area = band_at(&manager, Au(0));
        assert!(!area.has_floats());
        assert_eq!(area.rect.start_corner.inline, Au(0));
        assert_eq!(area.rect.size.inline, Au(400 * 60));
        assert_eq!(area.rect.size.block, MAX_AU);
    }

    #[test]
    fn band_narrowed_by_one_float_per_side() {
        let manager = manager_with(&[
            (region(0, 0, 100, 50), FloatSide::InlineStart),
            (region(350, 0, 50, 30), FloatSide::InlineEnd),
        ]);
        let area = manager.get_flow_area(
            WritingMode::horizontal_tb(),
            Au(0),
            BandInfoType::BandFromPoint,
            MAX_AU,
            content_area(400, MAX_AU),
            ShapeType::Margin,
            None,
        );
        assert!(area.has_floats());
        assert_eq!(area.rect.start_corner.inline, Au(100));
        assert_eq!(area.rect.size.inline, Au(250));
        // The band stays valid until the shorter float ends.
        assert_eq!(area.rect.size.block, Au(30));
    }

    #[test]
    fn band_below_all_floats_is_clean() {
        let manager = manager_with(&[(region(0, 0, 100, 50), FloatSide::InlineStart)]);
        let area = manager.get_flow_area(
            WritingMode::horizontal_tb(),
            Au(50),
            BandInfoType::BandFromPoint,
            MAX_AU,
            content_area(400, MAX_AU),
            ShapeType::Margin,
            None,
        );
        assert!(!area.has_floats());
        assert_eq!(area.rect.size.inline, Au(400));
    }

    #[test]
    fn band_from_point_sees_float_further_down() {
        let manager = manager_with(&[(region(0, 40, 100, 50), FloatSide::InlineStart)]);
        let area = manager.get_flow_area(
            WritingMode::horizontal_tb(),
            Au(0),
            BandInfoType::BandFromPoint,
            MAX_AU,
            content_area(400, MAX_AU),
            ShapeType::Margin,
            None,
        );
        // Full width, but the band only extends to the float's top.
        assert!(!area.has_floats());
        assert_eq!(area.rect.size.inline, Au(400));
        assert_eq!(area.rect.size.block, Au(40));
    }

    #[test]
    fn width_within_height_accounts_for_floats_in_extent() {
        let manager = manager_with(&[(region(0, 40, 100, 50), FloatSide::InlineStart)]);
        let area = manager.get_flow_area(
            WritingMode::horizontal_tb(),
            Au(0),
            BandInfoType::WidthWithinHeight,
            Au(60),
            content_area(400, MAX_AU),
            ShapeType::Margin,
            None,
        );
        assert!(area.has_floats());
        assert_eq!(area.rect.start_corner.inline, Au(100));
        assert_eq!(area.rect.size.inline, Au(300));
        assert_eq!(area.rect.size.block, Au(60));
    }

    #[test]
    fn crossing_floats_clamp_to_zero_width() {
        let manager = manager_with(&[
            (region(0, 0, 300, 50), FloatSide::InlineStart),
            (region(100, 0, 300, 50), FloatSide::InlineEnd),
        ]);
        let area = band_at(&manager, Au(0));
        assert!(area.has_floats());
        assert_eq!(area.rect.size.inline, Au(0));
        assert!(area.isize_is_actually_negative());
    }

    #[test]
    fn shape_outside_reduces_exclusion_area_for_shape_queries() {
        let mut style = FloatStyle::left();
        style.shape_outside = ShapeOutside::Inset(LogicalSides {
            inline_start: Au(0),
            inline_end: Au(40),
            block_start: Au(0),
            block_end: Au(0),
        });
        let mut manager = FloatManager::new(WritingMode::horizontal_tb());
        add(&mut manager, style, region(0, 0, 100, 50), FloatSide::InlineStart);

        let margin_query = manager.get_flow_area(
            WritingMode::horizontal_tb(),
            Au(0),
            BandInfoType::BandFromPoint,
            MAX_AU,
            content_area(400, MAX_AU),
            ShapeType::Margin,
            None,
        );
        let shape_query = manager.get_flow_area(
            WritingMode::horizontal_tb(),
            Au(0),
            BandInfoType::BandFromPoint,
            MAX_AU,
            content_area(400, MAX_AU),
            ShapeType::ShapeOutside,
            None,
        );
        assert_eq!(margin_query.rect.start_corner.inline, Au(100));
        assert_eq!(shape_query.rect.start_corner.inline, Au(60));
    }

    #[test]
    fn clear_floats_advances_past_cleared_side_only() {
        let manager = manager_with(&[
            (region(0, 0, 100, 50), FloatSide::InlineStart),
            (region(350, 0, 50, 30), FloatSide::InlineEnd),
        ]);
        assert_eq!(manager.clear_floats(Au(0), Clear::InlineStart), Au(50));
        assert_eq!(manager.clear_floats(Au(0), Clear::InlineEnd), Au(30));
        assert_eq!(manager.clear_floats(Au(0), Clear::Both), Au(50));
        assert_eq!(manager.clear_floats(Au(0), Clear::None), Au(0));
        // Already past everything: no movement.
        assert_eq!(manager.clear_floats(Au(80), Clear::Both), Au(80));
    }

    #[test]
    fn clear_continues_after_push_past_break() {
        let mut manager = manager_with(&[]);
        assert!(!manager.clear_continues(Clear::Both));
        manager.set_pushed_float_past_break(FloatSide::InlineStart);
        assert!(manager.clear_continues(Clear::InlineStart));
        assert!(manager.clear_continues(Clear::Both));
        assert!(!manager.clear_continues(Clear::InlineEnd));
        assert!(!manager.clear_continues(Clear::None));
    }

    #[test]
    fn checkpoint_pop_restores_floats_and_flags() {
        let mut manager = manager_with(&[(region(0, 0, 100, 50), FloatSide::InlineStart)]);
        let key = manager.push_state();
        add(
            &mut manager,
            FloatStyle::right(),
            region(300, 10, 100, 50),
            FloatSide::InlineEnd,
        );
        manager.set_pushed_float_past_break(FloatSide::InlineEnd);
        manager.translate(LogicalVec2 {
            inline: Au(7),
            block: Au(9),
        });
        manager.pop_state(key);
        assert_eq!(manager.floats.len(), 1);
        assert!(!manager.clear_continues(Clear::InlineEnd));
        assert_eq!(manager.translation(), LogicalVec2::zero());
    }

    #[test]
    fn checkpoint_forget_commits_floats() {
        let mut manager = manager_with(&[]);
        let key = manager.push_state();
        add(
            &mut manager,
            FloatStyle::left(),
            region(0, 0, 100, 50),
            FloatSide::InlineStart,
        );
        manager.forget_state(key);
        assert!(manager.has_any_floats());
        assert_eq!(manager.clear_floats(Au(0), Clear::InlineStart), Au(50));
    }

    #[test]
    fn flow_area_against_checkpoint_ignores_later_floats() {
        let mut manager = manager_with(&[(region(0, 0, 100, 50), FloatSide::InlineStart)]);
        let key = manager.push_state();
        add(
            &mut manager,
            FloatStyle::right(),
            region(300, 0, 100, 50),
            FloatSide::InlineEnd,
        );
        let live = band_at(&manager, Au(0));
        let saved = manager.get_flow_area(
            WritingMode::horizontal_tb(),
            Au(0),
            BandInfoType::BandFromPoint,
            MAX_AU,
            content_area(400 * 60, MAX_AU),
            ShapeType::Margin,
            Some(key),
        );
        assert!(live.rect.size.inline < saved.rect.size.inline);
        manager.forget_state(key);
    }

    #[test]
    fn translation_applies_to_regions_and_queries() {
        let mut manager = FloatManager::new(WritingMode::horizontal_tb());
        manager.translate(LogicalVec2 {
            inline: Au(10),
            block: Au(100),
        });
        add(
            &mut manager,
            FloatStyle::left(),
            region(0, 0, 50, 20),
            FloatSide::InlineStart,
        );
        // Same coordinate space as the insertion: the float is right there.
        let area = manager.get_flow_area(
            WritingMode::horizontal_tb(),
            Au(0),
            BandInfoType::BandFromPoint,
            MAX_AU,
            content_area(400, MAX_AU),
            ShapeType::Margin,
            None,
        );
        assert!(area.has_floats());
        assert_eq!(area.rect.start_corner.inline, Au(50));
        // Clearing is translated back into the caller's space too.
        assert_eq!(manager.clear_floats(Au(0), Clear::InlineStart), Au(20));

        manager.translate(LogicalVec2 {
            inline: Au(-10),
            block: Au(-100),
        });
        let outer = manager.clear_floats(Au(0), Clear::InlineStart);
        assert_eq!(outer, Au(120));
    }

    #[test]
    fn interval_set_merges_overlaps() {
        let mut set = IntervalSet::new();
        set.include(Au(0), Au(10));
        set.include(Au(20), Au(30));
        assert_eq!(set.intervals(), &[(Au(0), Au(10)), (Au(20), Au(30))]);
        set.include(Au(5), Au(25));
        assert_eq!(set.intervals(), &[(Au(0), Au(30))]);
        assert!(set.intersects(Au(15), Au(16)));
        assert!(!set.intersects(Au(31), Au(40)));
    }

    quickcheck! {
        /// Placed floats keep block-start order (CSS 2.1 § 9.5.1 rule 2): the
        /// manager's lowest float block-start never decreases.
        fn float_b_starts_are_monotonic(starts: Vec<(u16, bool)>) -> bool {
            let mut manager = FloatManager::new(WritingMode::horizontal_tb());
            let mut last = MIN_AU;
            for (start, left) in starts {
                // The placement algorithm enforces the ordering invariant
                // before registering; model that here.
                let b = max(Au(start as i32), manager.lowest_float_b_start());
                let side = if left { FloatSide::InlineStart } else { FloatSide::InlineEnd };
                let style = if left { FloatStyle::left() } else { FloatStyle::right() };
                add(&mut manager, style, region(0, b.0, 10, 10), side);
                let lowest = manager.lowest_float_b_start();
                if lowest < last {
                    return false;
                }
                last = lowest;
            }
            true
        }

        /// Querying twice with no intervening mutation returns the same band.
        fn flow_area_is_idempotent(floats: Vec<(u16, u8, u8, bool)>, probe: u16) -> bool {
            let mut manager = FloatManager::new(WritingMode::horizontal_tb());
            for (b, isize, bsize, left) in floats {
                let b = max(Au(b as i32), manager.lowest_float_b_start());
                let side = if left { FloatSide::InlineStart } else { FloatSide::InlineEnd };
                let style = if left { FloatStyle::left() } else { FloatStyle::right() };
                add(&mut manager, style, region(0, b.0, isize as i32, bsize as i32), side);
            }
            let first = band_at(&manager, Au(probe as i32));
            let second = band_at(&manager, Au(probe as i32));
            first.rect == second.rect && first.has_floats() == second.has_floats()
        }

        /// Band inline sizes are never negative, whatever got placed.
        fn flow_area_inline_size_is_non_negative(
            floats: Vec<(u16, u16, u8, bool)>,
            probe: u16
        ) -> bool {
            let mut manager = FloatManager::new(WritingMode::horizontal_tb());
            for (i, isize, bsize, left) in floats {
                let b = manager.lowest_float_b_start().max(Au::zero());
                let side = if left { FloatSide::InlineStart } else { FloatSide::InlineEnd };
                let style = if left { FloatStyle::left() } else { FloatStyle::right() };
                add(&mut manager, style, region(i as i32, b.0, isize as i32, bsize as i32), side);
            }
            let area = manager.get_flow_area(
                WritingMode::horizontal_tb(),
                Au(probe as i32),
                BandInfoType::BandFromPoint,
                MAX_AU,
                content_area(100, MAX_AU),
                ShapeType::Margin,
                None,
            );
            area.rect.size.inline >= Au::zero()
        }

        /// Clearing never moves the coordinate backwards.
        fn clear_is_monotonic(floats: Vec<(u16, u8, bool)>, probe: u16, which: u8) -> bool {
            let mut manager = FloatManager::new(WritingMode::horizontal_tb());
            for (b, bsize, left) in floats {
                let b = max(Au(b as i32), manager.lowest_float_b_start());
                let side = if left { FloatSide::InlineStart } else { FloatSide::InlineEnd };
                let style = if left { FloatStyle::left() } else { FloatStyle::right() };
                add(&mut manager, style, region(0, b.0, 10, bsize as i32), side);
            }
            let clear = match which % 4 {
                0 => Clear::None,
                1 => Clear::InlineStart,
                2 => Clear::InlineEnd,
                _ => Clear::Both,
            };
            let b_coord = Au(probe as i32);
            manager.clear_floats(b_coord, clear) >= b_coord
        }
    }
}
