/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Block-and-float flow layout.
//!
//! [`BlockReflowState`] is the state a block keeps while positioning its
//! children line by line: the block-axis cursor, the content area, the
//! margin being collapsed, and the floats that are waiting for a place. The
//! float placement algorithm lives here too; the per-formatting-context
//! float registry it talks to is in [`float`].
//!
//! See CSS 2.1 § 9.5.1: <https://www.w3.org/TR/CSS2/visuren.html#float-position>

use std::cmp::max;

use app_units::{Au, MAX_AU};
use bitflags::bitflags;
use euclid::num::Zero;
use log::{debug, trace, warn};
use smallvec::SmallVec;

use crate::cell::ArcRefCell;
use crate::flow::float::{
    BandInfoType, FloatFrame, FloatManager, FlowAreaRect, OverflowAreas, ShapeType, StateKey,
};
use crate::flow::line::{LineBox, LineLayout};
use crate::geom::{LogicalRect, LogicalSides, LogicalVec2, PhysicalSize, WritingMode};
use crate::style_ext::{BoxDecorationBreak, BreakWithin, Clear, FloatEdge, FloatSide};

pub mod float;
pub mod line;

/// A block-axis margin under collapse: the maximum of the positive adjoining
/// margins plus the minimum of the negative ones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollapsedMargin {
    max_positive: Au,
    min_negative: Au,
}

impl CollapsedMargin {
    #[inline]
    pub fn zero() -> Self {
        CollapsedMargin {
            max_positive: Au::zero(),
            min_negative: Au::zero(),
        }
    }

    #[inline]
    pub fn new(margin: Au) -> Self {
        CollapsedMargin {
            max_positive: margin.max(Au::zero()),
            min_negative: margin.min(Au::zero()),
        }
    }

    #[inline]
    pub fn adjoin(&self, other: &Self) -> Self {
        CollapsedMargin {
            max_positive: self.max_positive.max(other.max_positive),
            min_negative: self.min_negative.min(other.min_negative),
        }
    }

    #[inline]
    pub fn adjoin_assign(&mut self, other: &Self) {
        *self = self.adjoin(other);
    }

    #[inline]
    pub fn solve(&self) -> Au {
        self.max_positive + self.min_negative
    }
}

/// How far a reflow got before running out of space, plus whether a forced
/// break was requested before the frame.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReflowStatus {
    completion: Completion,
    inline_break_before: bool,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Completion {
    #[default]
    FullyComplete,
    /// Ran out of available block-size; a continuation is needed and this
    /// frame's block-end edge is open.
    Incomplete,
    /// The frame itself fit, but some descendant (e.g. a pushed float) needs
    /// a continuation.
    OverflowIncomplete,
}

impl ReflowStatus {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completion != Completion::Incomplete
    }

    #[inline]
    pub fn is_fully_complete(&self) -> bool {
        self.completion == Completion::FullyComplete
    }

    #[inline]
    pub fn is_incomplete(&self) -> bool {
        self.completion == Completion::Incomplete
    }

    #[inline]
    pub fn is_overflow_incomplete(&self) -> bool {
        self.completion == Completion::OverflowIncomplete
    }

    pub fn set_incomplete(&mut self) {
        self.completion = Completion::Incomplete;
    }

    /// Incomplete is stronger; don't downgrade it.
    pub fn set_overflow_incomplete(&mut self) {
        if self.completion != Completion::Incomplete {
            self.completion = Completion::OverflowIncomplete;
        }
    }

    #[inline]
    pub fn is_inline_break_before(&self) -> bool {
        self.inline_break_before
    }

    pub fn set_inline_break_before(&mut self) {
        self.inline_break_before = true;
    }
}

/// The outcome of attempting to place one float.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlaceFloatResult {
    /// The float was placed and registered with the float manager.
    Placed,
    /// The float doesn't fit in the inline space left on the current line;
    /// it must wait until the line is done.
    ShouldPlaceBelowCurrentLine,
    /// The float was pushed in its entirety to the next column or page.
    ShouldPlaceInNextContinuation,
}

/// The outcome of clearing floats at a block position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClearFloatsResult {
    BCoordNoChange,
    BCoordAdvanced,
    /// A float of a cleared side continues past the fragmentation break;
    /// clearing cannot complete on this fragment.
    FloatsPushedOrSplit,
}

/// Resolved inputs for one block's reflow pass. Margins, sizes, and
/// pagination flags are resolved upstream; this engine only reads them.
#[derive(Clone, Debug)]
pub struct ReflowInput {
    pub writing_mode: WritingMode,
    /// The block's computed content-box inline size.
    pub computed_inline_size: Au,
    /// The block-size available to this fragment; `MAX_AU` when the block is
    /// not being fragmented.
    pub available_block_size: Au,
    /// Border plus padding, already reduced for skipped fragment sides.
    pub border_padding: LogicalSides<Au>,
    /// Physical size of the containing box, anchoring logical-to-physical
    /// conversions in writing modes with flipped axes.
    pub container_size: PhysicalSize<Au>,
    /// Whether this fragment starts at the top of a page or column.
    pub is_top_of_page: bool,
    pub box_decoration_break: BoxDecorationBreak,
}

impl ReflowInput {
    /// An unconstrained horizontal-ltr input with the given content-box
    /// inline size and no border or padding.
    pub fn unconstrained(computed_inline_size: Au) -> Self {
        ReflowInput {
            writing_mode: WritingMode::horizontal_tb(),
            computed_inline_size,
            available_block_size: MAX_AU,
            border_padding: LogicalSides::zero(),
            container_size: PhysicalSize::new(computed_inline_size, Au::zero()),
            is_top_of_page: false,
            box_decoration_break: BoxDecorationBreak::Slice,
        }
    }
}

/// Per-pass options that come from the block frame rather than from the
/// resolved style.
#[derive(Clone, Debug)]
pub struct BlockReflowOptions {
    /// Margin collapsing must not propagate out of the block-start edge.
    pub is_b_start_margin_root: bool,
    /// Margin collapsing must not propagate out of the block-end edge.
    pub is_b_end_margin_root: bool,
    /// The block-size consumed by this block's previous continuations.
    pub consumed_b_size: Au,
    /// The content-box block size the whole (unfragmented) box would have,
    /// or `MAX_AU` if not yet known. Decides whether cloned block-end
    /// decorations must be reserved out of the available space.
    pub effective_content_box_b_size: Au,
    /// Cached `align-content` shift to apply to the content area.
    pub align_content_shift: Au,
}

impl Default for BlockReflowOptions {
    fn default() -> Self {
        BlockReflowOptions {
            is_b_start_margin_root: false,
            is_b_end_margin_root: false,
            consumed_b_size: Au::zero(),
            effective_content_box_b_size: MAX_AU,
            align_content_shift: Au::zero(),
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct BlockReflowFlags: u8 {
        const IS_B_START_MARGIN_ROOT = 1 << 0;
        const IS_B_END_MARGIN_ROOT = 1 << 1;
        const SHOULD_APPLY_B_START_MARGIN = 1 << 2;
    }
}

/// The available size handed to a float's own reflow.
#[derive(Clone, Copy, Debug)]
pub struct FloatReflowInput {
    pub available_size: LogicalVec2<Au>,
    /// Top-of-page for the float itself; cleared when other floats pushed
    /// this one down, so the float's contents don't force another break.
    pub is_top_of_page: bool,
}

/// Reflow services the owning block frame provides to float placement.
pub trait FloatLayout {
    /// Lay out the float's contents within the available size, setting its
    /// border-box `size` and `overflow`, and report how far the reflow got.
    fn reflow_float(&mut self, float: &mut FloatFrame, input: &FloatReflowInput) -> ReflowStatus;

    /// Create the next-in-flow for a float whose reflow did not complete.
    fn split_float(&mut self, float: &mut FloatFrame, status: &ReflowStatus);
}

/// A block-level child that cannot flow around floats (a table, a replaced
/// box, an independent formatting context root): the data needed to decide
/// how far it must be pushed to sit beside them.
#[derive(Clone, Debug)]
pub struct FloatAvoidingBlock {
    /// The child's resolved margin. Margins may overlap floats even though
    /// the border box may not.
    pub margin: LogicalSides<Au>,
    /// The narrowest border-box inline size the child can shrink to.
    pub min_border_box_inline_size: Au,
}

/// State kept while reflowing a block frame and positioning its children.
///
/// One of these exists per block frame per reflow pass, nested along the
/// call stack as blocks recurse into their children. The float manager is
/// shared by reference with every state in the same block formatting
/// context; a checkpoint of it is taken here at construction and committed
/// when this state drops, or rolled back explicitly for speculative passes.
pub struct BlockReflowState<'a> {
    reflow_input: &'a ReflowInput,
    float_manager: &'a mut FloatManager,
    float_manager_checkpoint: Option<StateKey>,
    /// The float manager translation at construction. Queries verify against
    /// it; `add_float` restores it around placement after nested inline
    /// frames moved the origin.
    float_manager_origin: LogicalVec2<Au>,

    /// The content area all children are placed within. Inline start and
    /// size hold for the whole pass; the block size is `MAX_AU` when
    /// unconstrained.
    pub content_area: LogicalRect<Au>,
    pub border_padding: LogicalSides<Au>,
    /// The block-axis cursor: where the next line starts. Monotonic over a
    /// pass, except that float placement may perturb and restore it.
    pub b_coord: Au,
    /// The collapsed block-end margin carried out of the previous line.
    pub prev_b_end_margin: CollapsedMargin,
    /// Completion state of this reflow; pushing a float past a break marks
    /// it overflow-incomplete.
    pub reflow_status: ReflowStatus,

    current_line_floats: SmallVec<[ArcRefCell<FloatFrame>; 2]>,
    below_current_line_floats: SmallVec<[ArcRefCell<FloatFrame>; 2]>,
    pushed_floats: Vec<ArcRefCell<FloatFrame>>,
    float_overflow_areas: OverflowAreas,

    consumed_b_size: Au,
    align_content_shift: Au,
    /// During a redo-with-more-floats line pass, the line's known block
    /// size, so band updates account for the full line extent.
    line_b_size: Option<Au>,
    flags: BlockReflowFlags,
}

impl<'a> BlockReflowState<'a> {
    pub fn new(
        reflow_input: &'a ReflowInput,
        float_manager: &'a mut FloatManager,
        options: &BlockReflowOptions,
    ) -> Self {
        let wm = reflow_input.writing_mode;
        debug_assert!(
            options.consumed_b_size != MAX_AU,
            "the consumed block-size should be constrained"
        );
        debug_assert!(wm == float_manager.writing_mode());

        let border_padding = reflow_input.border_padding;
        let mut flags = BlockReflowFlags::empty();
        if options.is_b_start_margin_root || border_padding.block_start != Au::zero() {
            flags |= BlockReflowFlags::IS_B_START_MARGIN_ROOT;
            flags |= BlockReflowFlags::SHOULD_APPLY_B_START_MARGIN;
        }
        if options.is_b_end_margin_root || border_padding.block_end != Au::zero() {
            flags |= BlockReflowFlags::IS_B_END_MARGIN_ROOT;
        }

        if reflow_input.computed_inline_size == MAX_AU {
            warn!(
                "block has unconstrained inline-size; this should only result from very large \
                 sizes, not attempts at intrinsic size calculation"
            );
        }

        // Compute the content-area block size. A specified block-size is
        // not consulted here: extra content is the overflow property's
        // business. Only a constrained available size (pagination) limits
        // the area children may occupy.
        let available_b_size = reflow_input.available_block_size;
        let content_b_size = if available_b_size != MAX_AU {
            // The block-end edge of the space available to children sits
            // inside our block-end border and padding, except that cloned
            // decorations must be reserved on every fragment that will have
            // them.
            let reserve_block_end_bp = reflow_input.box_decoration_break ==
                BoxDecorationBreak::Clone &&
                (options.effective_content_box_b_size == MAX_AU ||
                    options.effective_content_box_b_size + border_padding.block_sum() >
                        available_b_size);
            let bp = if reserve_block_end_bp {
                border_padding.block_sum()
            } else {
                border_padding.block_start
            };
            max(Au::zero(), available_b_size - bp)
        } else {
            MAX_AU
        };

        let mut content_area = LogicalRect {
            start_corner: LogicalVec2 {
                inline: border_padding.inline_start,
                block: border_padding.block_start,
            },
            size: LogicalVec2 {
                inline: reflow_input.computed_inline_size,
                block: content_b_size,
            },
        };
        let mut b_coord = content_area.start_corner.block;

        // Account for an existing cached align-content shift; the caller
        // re-positions later if the shift changes.
        if options.align_content_shift != Au::zero() {
            b_coord += options.align_content_shift;
            content_area.start_corner.block += options.align_content_shift;
            if available_b_size != MAX_AU {
                content_area.size.block += options.align_content_shift;
            }
        }

        let float_manager_origin = float_manager.translation();
        let float_manager_checkpoint = Some(float_manager.push_state());

        BlockReflowState {
            reflow_input,
            float_manager,
            float_manager_checkpoint,
            float_manager_origin,
            content_area,
            border_padding,
            b_coord,
            prev_b_end_margin: CollapsedMargin::zero(),
            reflow_status: ReflowStatus::new(),
            current_line_floats: SmallVec::new(),
            below_current_line_floats: SmallVec::new(),
            pushed_floats: Vec::new(),
            float_overflow_areas: OverflowAreas::zero(),
            consumed_b_size: options.consumed_b_size,
            align_content_shift: options.align_content_shift,
            line_b_size: None,
            flags,
        }
    }

    #[inline]
    pub fn writing_mode(&self) -> WritingMode {
        self.reflow_input.writing_mode
    }

    #[inline]
    pub fn content_i_start(&self) -> Au {
        self.content_area.start_corner.inline
    }

    #[inline]
    pub fn content_i_end(&self) -> Au {
        self.content_area.max_inline_position()
    }

    #[inline]
    pub fn content_i_size(&self) -> Au {
        self.content_area.size.inline
    }

    #[inline]
    pub fn content_b_start(&self) -> Au {
        self.content_area.start_corner.block
    }

    /// The available block-size for children; `MAX_AU` when unconstrained.
    #[inline]
    pub fn content_b_size(&self) -> Au {
        self.content_area.size.block
    }

    /// The block-end edge of the space available to children.
    #[inline]
    pub fn content_b_end(&self) -> Au {
        if self.content_area.size.block == MAX_AU {
            MAX_AU
        } else {
            self.content_area.max_block_position()
        }
    }

    #[inline]
    pub fn consumed_b_size(&self) -> Au {
        self.consumed_b_size
    }

    /// Whether nothing has been placed between the content-area block-start
    /// and the cursor yet.
    #[inline]
    pub fn is_adjacent_with_b_start(&self) -> bool {
        self.b_coord == self.content_b_start()
    }

    #[inline]
    pub fn is_b_start_margin_root(&self) -> bool {
        self.flags.contains(BlockReflowFlags::IS_B_START_MARGIN_ROOT)
    }

    #[inline]
    pub fn is_b_end_margin_root(&self) -> bool {
        self.flags.contains(BlockReflowFlags::IS_B_END_MARGIN_ROOT)
    }

    #[inline]
    pub fn should_apply_b_start_margin(&self) -> bool {
        self.flags
            .contains(BlockReflowFlags::SHOULD_APPLY_B_START_MARGIN)
    }

    pub fn float_manager(&mut self) -> &mut FloatManager {
        self.float_manager
    }

    /// The union of the overflow areas of every float placed so far, for
    /// the caller to fold into the block's own overflow.
    #[inline]
    pub fn float_overflow_areas(&self) -> OverflowAreas {
        self.float_overflow_areas
    }

    pub fn set_line_b_size(&mut self, b_size: Option<Au>) {
        self.line_b_size = b_size;
    }

    /// Floats placed on the in-progress line, to be handed to the line once
    /// it is done.
    pub fn take_current_line_floats(&mut self) -> SmallVec<[ArcRefCell<FloatFrame>; 2]> {
        std::mem::take(&mut self.current_line_floats)
    }

    #[inline]
    pub fn has_below_current_line_floats(&self) -> bool {
        !self.below_current_line_floats.is_empty()
    }

    /// Floats pushed past the fragmentation break, for the caller to hand to
    /// the next continuation.
    pub fn take_pushed_floats(&mut self) -> Vec<ArcRefCell<FloatFrame>> {
        std::mem::take(&mut self.pushed_floats)
    }

    /// Roll the float manager back to its state at construction, dropping
    /// every float this block placed. For abandoning a speculative pass; a
    /// normal pass just drops the state, which commits instead.
    pub fn restore_float_manager_state(&mut self) {
        if let Some(key) = self.float_manager_checkpoint.take() {
            self.float_manager.pop_state(key);
        }
    }

    pub fn undo_align_content_shift(&mut self) {
        if self.align_content_shift == Au::zero() {
            return;
        }
        self.b_coord -= self.align_content_shift;
        self.content_area.start_corner.block -= self.align_content_shift;
        if self.reflow_input.available_block_size != MAX_AU {
            self.content_area.size.block -= self.align_content_shift;
        }
        self.align_content_shift = Au::zero();
    }

    fn debug_check_float_manager_origin(&self) {
        debug_assert!(
            self.float_manager.translation() == self.float_manager_origin,
            "bad float manager coordinate system"
        );
    }

    /// The block-size from `b_coord` to the content block-end, for band
    /// queries: unconstrained passes stay unconstrained.
    fn band_b_size_at(&self, b_coord: Au) -> Au {
        if self.content_area.size.block == MAX_AU {
            MAX_AU
        } else {
            max(self.content_b_end() - b_coord, Au::zero())
        }
    }

    /// The band of space available to a line at `b_coord`, measured against
    /// float shapes.
    pub fn get_float_available_space(&self, mode: WritingMode, b_coord: Au) -> FlowAreaRect {
        self.get_float_available_space_with_state(mode, b_coord, ShapeType::ShapeOutside, None)
    }

    pub fn get_float_available_space_with_state(
        &self,
        mode: WritingMode,
        b_coord: Au,
        shape_type: ShapeType,
        state: Option<StateKey>,
    ) -> FlowAreaRect {
        self.debug_check_float_manager_origin();
        let result = self.float_manager.get_flow_area(
            mode,
            b_coord,
            BandInfoType::BandFromPoint,
            self.band_b_size_at(b_coord),
            self.content_area,
            shape_type,
            state,
        );
        trace!(
            "get_float_available_space: band={:?} has_floats={}",
            result.rect,
            result.has_floats()
        );
        result
    }

    /// The worst-case band over a known block extent, for boxes that must
    /// keep clear of floats across their whole height.
    pub fn get_float_available_space_for_b_size(
        &self,
        mode: WritingMode,
        b_coord: Au,
        b_size: Au,
        state: Option<StateKey>,
    ) -> FlowAreaRect {
        self.debug_check_float_manager_origin();
        let result = self.float_manager.get_flow_area(
            mode,
            b_coord,
            BandInfoType::WidthWithinHeight,
            b_size,
            self.content_area,
            ShapeType::ShapeOutside,
            state,
        );
        trace!(
            "get_float_available_space_for_b_size: space={:?} has_floats={}",
            result.rect,
            result.has_floats()
        );
        result
    }

    /// The band a new float is placed against: float margin boxes, not
    /// shapes.
    fn get_float_available_space_for_placing_float(
        &self,
        mode: WritingMode,
        b_coord: Au,
    ) -> FlowAreaRect {
        self.debug_check_float_manager_origin();
        self.float_manager.get_flow_area(
            mode,
            b_coord,
            BandInfoType::BandFromPoint,
            self.band_b_size_at(b_coord),
            self.content_area,
            ShapeType::Margin,
            None,
        )
    }

    /// Offsets that keep a float-avoiding child's border box out of the
    /// floats while letting its margins overlap them. Clamped to zero so
    /// negative margins don't push the box back under a float.
    pub fn compute_float_avoiding_offsets(
        &self,
        avoiding: &FloatAvoidingBlock,
        float_available_space: &LogicalRect<Au>,
    ) -> (Au, Au) {
        debug_assert!(
            float_available_space.start_corner.inline >= self.content_i_start(),
            "bad avail space rect inline-coord"
        );
        debug_assert!(
            float_available_space.size.inline == Au::zero() ||
                float_available_space.max_inline_position() <= self.content_i_end(),
            "bad avail space rect inline-size"
        );

        if float_available_space.size.inline == self.content_i_size() {
            // No floats around; no margins to compute.
            return (Au::zero(), Au::zero());
        }

        let margin = &avoiding.margin;
        let i_start_float_offset = float_available_space.start_corner.inline - self.content_i_start();
        let i_start_offset =
            max(max(i_start_float_offset, margin.inline_start) - margin.inline_start, Au::zero());
        let i_end_float_offset = self.content_i_end() - float_available_space.max_inline_position();
        let i_end_offset =
            max(max(i_end_float_offset, margin.inline_end) - margin.inline_end, Au::zero());
        (i_start_offset, i_end_offset)
    }

    /// The space available to a block-level child at the cursor. A child
    /// that flows around floats gets the full content inline-size unless its
    /// `float-edge` asks for the margin-box rule; a float-avoiding child
    /// gets the band reduced by [`Self::compute_float_avoiding_offsets`].
    pub fn compute_block_avail_space(
        &self,
        float_available_space: &FlowAreaRect,
        float_edge: FloatEdge,
        avoiding: Option<&FloatAvoidingBlock>,
    ) -> LogicalRect<Au> {
        let mut result = LogicalRect::zero();
        result.start_corner.block = self.b_coord;
        // The cursor may sit past the content block-end when a margin pushed
        // it off the page, so this can go negative; callers treat it as "no
        // room".
        result.size.block = if self.content_b_size() == MAX_AU {
            MAX_AU
        } else {
            self.content_b_end() - self.b_coord
        };

        match avoiding {
            None => {
                if float_available_space.has_floats() && float_edge == FloatEdge::MarginBox {
                    // The child's margins go adjacent to the float.
                    result.start_corner.inline = float_available_space.rect.start_corner.inline;
                    result.size.inline = float_available_space.rect.size.inline;
                } else {
                    // The child flows around the floats itself; give it
                    // everything.
                    result.start_corner.inline = self.content_i_start();
                    result.size.inline = self.content_i_size();
                }
            },
            Some(avoiding) => {
                let (i_start_offset, i_end_offset) =
                    self.compute_float_avoiding_offsets(avoiding, &float_available_space.rect);
                result.start_corner.inline = self.content_i_start() + i_start_offset;
                result.size.inline = self.content_i_size() - i_start_offset - i_end_offset;
            },
        }
        result
    }

    /// The size a float gets to lay out in: the full content inline-size,
    /// and whatever block-size remains below the cursor.
    pub fn compute_available_size_for_float(&self) -> LogicalVec2<Au> {
        LogicalVec2 {
            inline: self.content_i_size(),
            block: self.band_b_size_at(self.b_coord),
        }
    }

    /// Whether a float-avoiding block fits beside the floats at this band.
    /// The inline-start side is offset by the larger of the float intrusion
    /// and the block's own start margin; for web compatibility the
    /// inline-end margin is ignored.
    pub fn float_avoiding_block_fits_in_avail_space(
        &self,
        avoiding: &FloatAvoidingBlock,
        float_available_space: &FlowAreaRect,
    ) -> bool {
        if !float_available_space.has_floats() {
            // No floats, always fits; don't bother measuring.
            return true;
        }
        if float_available_space.isize_is_actually_negative() {
            // Floats from both sides crossed; nothing fits here.
            return false;
        }

        max(
            float_available_space.rect.start_corner.inline - self.content_i_start(),
            avoiding.margin.inline_start,
        ) + avoiding.min_border_box_inline_size +
            (self.content_i_end() - float_available_space.rect.max_inline_position()) <=
            self.content_i_size()
    }

    /// Reconstruct the collapsed block-end margin preceding `line_index`, so
    /// that a reflow resuming there collapses margins the way a full pass
    /// would have. `line_index` may be `lines.len()`, the fencepost past the
    /// last line; margins always need recovering at the end of a block.
    pub fn reconstruct_margin_before(&mut self, lines: &[LineBox], line_index: usize) {
        debug_assert!(line_index <= lines.len());
        self.prev_b_end_margin = CollapsedMargin::zero();
        let mut index = line_index;
        while index > 0 {
            index -= 1;
            let line = &lines[index];
            if line.is_block() {
                self.prev_b_end_margin = line.carried_out_b_end_margin;
                return;
            }
            if !line.is_empty() {
                // A non-empty inline line interrupts margin collapsing.
                return;
            }
            // Empty line: keep walking. At the block's first line the margin
            // was either carried out of the block start and applied already,
            // or this block is a margin root; in both cases zero is right.
        }
    }

    /// Replay a line's floats into the float manager, sliding them by the
    /// amount the line itself moved. Live float-manager state doesn't
    /// survive across reflow passes; resuming mid-block starts from replays
    /// of the preceding lines.
    pub fn recover_floats(&mut self, line: &LineBox, delta_b_coord: Au) {
        let wm = self.reflow_input.writing_mode;
        for float_cell in &line.floats {
            let mut float = float_cell.borrow_mut();
            if delta_b_coord != Au::zero() {
                float.move_block_position_by(delta_b_coord);
            }
            let region = float.region();
            let side = float.style.used_float(wm);
            trace!(
                "recover_floats: delta_b_coord={:?} region={:?}",
                delta_b_coord,
                region
            );
            self.float_manager.add_float(float_cell, &float, region, side);
        }
    }

    /// Bring this state up to where it would have been had `line` just been
    /// reflowed, after the line was slid by `delta_b_coord` instead.
    pub fn recover_state_from(&mut self, line: &LineBox, delta_b_coord: Au) {
        if line.has_floats() || line.is_block() {
            self.recover_floats(line, delta_b_coord);
        }
    }

    /// Called when inline layout hits a float placeholder mid-line. Places
    /// the float now if nothing blocks that, otherwise defers it below the
    /// line. Returns whether the float was consumed (a float deferred below
    /// the line counts as consumed; whether it fits is resolved in
    /// [`Self::place_below_current_line_floats`]).
    pub fn add_float(
        &mut self,
        line_layout: &mut dyn LineLayout,
        float_cell: &ArcRefCell<FloatFrame>,
        available_inline_size: Au,
        layout: &mut dyn FloatLayout,
    ) -> bool {
        let wm = self.reflow_input.writing_mode;

        {
            let mut float = float_cell.borrow_mut();
            if float.is_pushed {
                // Pushed to a later fragment by a previous reflow; steal it
                // back. We may well push it again.
                float.is_pushed = false;
                self.pushed_floats.retain(|f| !f.ptr_eq(float_cell));
            }
        }

        // The placeholder may sit inside nested inline frames that moved the
        // float manager's origin; float placement happens in this block's
        // space.
        let translation_delta = self.float_manager.translation() - self.float_manager_origin;
        self.float_manager.translate(-translation_delta);

        let mut placed = false;
        let mut should_place_below_current_line = false;
        if self.below_current_line_floats.is_empty() {
            // An empty line imposes no inline-size constraint: nothing has
            // been laid out that the float could conflict with.
            let available_i_size_in_current_line = if line_layout.line_is_empty() {
                None
            } else {
                Some(available_inline_size)
            };
            match self.flow_and_place_float(float_cell, available_i_size_in_current_line, layout) {
                PlaceFloatResult::Placed => {
                    placed = true;
                    // Hand the reduced band back to the inline engine. When
                    // the line is being redone with a known block-size, the
                    // band must hold over that whole extent.
                    let float_avail_space = match self.line_b_size {
                        None => self.get_float_available_space(wm, self.b_coord),
                        Some(line_b_size) => self.get_float_available_space_for_b_size(
                            wm,
                            self.b_coord,
                            line_b_size,
                            None,
                        ),
                    };
                    let avail_space = LogicalRect {
                        start_corner: LogicalVec2 {
                            inline: float_avail_space.rect.start_corner.inline,
                            block: self.b_coord,
                        },
                        size: float_avail_space.rect.size,
                    };
                    line_layout.update_band(wm, &avail_space);
                    self.current_line_floats.push(float_cell.clone());
                },
                PlaceFloatResult::ShouldPlaceInNextContinuation => {
                    line_layout.set_had_float_pushed();
                },
                PlaceFloatResult::ShouldPlaceBelowCurrentLine => {
                    should_place_below_current_line = true;
                },
            }
        } else {
            // Once one float on the line is deferred, every later one is
            // too; floats must keep source order along the block axis.
            should_place_below_current_line = true;
        }

        if should_place_below_current_line {
            placed = true;
            self.below_current_line_floats.push(float_cell.clone());
        }

        self.float_manager.translate(translation_delta);
        placed
    }

    /// A float fits at a block position if no float intrudes there at all,
    /// or if its inline size fits the space prior floats left over.
    fn can_place_float(
        &self,
        float_margin_i_size: Au,
        float_available_space: &FlowAreaRect,
    ) -> bool {
        !float_available_space.has_floats() ||
            float_available_space.rect.size.inline >= float_margin_i_size
    }

    /// Find a place for one float, reflow it, and commit its geometry to the
    /// float manager. `available_i_size_in_current_line` carries the inline
    /// space left on a non-empty line; a float that doesn't fit it is
    /// deferred rather than placed.
    pub fn flow_and_place_float(
        &mut self,
        float_cell: &ArcRefCell<FloatFrame>,
        available_i_size_in_current_line: Option<Au>,
        layout: &mut dyn FloatLayout,
    ) -> PlaceFloatResult {
        // Adjustments to the cursor while placing the float are for the
        // float only, never for the non-floating content that follows.
        let saved_b_coord = self.b_coord;
        let result = self.flow_and_place_float_impl(
            float_cell,
            available_i_size_in_current_line,
            layout,
            saved_b_coord,
        );
        self.b_coord = saved_b_coord;
        result
    }

    fn flow_and_place_float_impl(
        &mut self,
        float_cell: &ArcRefCell<FloatFrame>,
        available_i_size_in_current_line: Option<Au>,
        layout: &mut dyn FloatLayout,
        saved_b_coord: Au,
    ) -> PlaceFloatResult {
        let wm = self.reflow_input.writing_mode;
        let mut float = float_cell.borrow_mut();

        // The float's old region, so damage can be propagated.
        let old_region = float.region();

        // CSS 2.1 § 9.5.1 rule 2: a float may not sit above any float placed
        // earlier in the source.
        self.b_coord = max(self.float_manager.lowest_float_b_start(), self.b_coord);

        let clear = float.style.used_clear(wm);
        if clear != Clear::None {
            let (b_coord, result) = self.clear_floats(self.b_coord, clear, None);
            if result == ClearFloatsResult::FloatsPushedOrSplit {
                self.push_float_past_break(&mut float, float_cell);
                return PlaceFloatResult::ShouldPlaceInNextContinuation;
            }
            self.b_coord = b_coord;
        }

        let mut available_size = self.compute_available_size_for_float();
        let mut float_margin = float.margin;
        let mut float_margin_i_size = float.margin_inline_size();
        let mut status = ReflowStatus::new();
        let mut float_is_top_of_page = self.reflow_input.is_top_of_page;

        // A floating first-letter has to be reflowed before its inline size
        // is known (which letters belong to it is only decided in reflow),
        // and so does an orthogonal float whose auto block-size is an inline
        // size in this container.
        let early_float_reflow = float.is_letter || float_margin_i_size == MAX_AU;
        if early_float_reflow {
            status = layout.reflow_float(
                &mut float,
                &FloatReflowInput {
                    available_size,
                    is_top_of_page: float_is_top_of_page,
                },
            );
            float_margin_i_size = float.size.inline + float_margin.inline_sum();
            debug_assert!(
                status.is_complete(),
                "letter frames and orthogonal floats with auto block-size shouldn't break, \
                 and if they do now, then they're breaking at the wrong point"
            );
        }

        if let Some(available) = available_i_size_in_current_line {
            if float_margin_i_size > available {
                // Doesn't fit what's left of the line; the caller will hold
                // it until the line is done.
                return PlaceFloatResult::ShouldPlaceBelowCurrentLine;
            }
        }

        let side = float.style.used_float(wm);

        // At the top of a page a float must be let through even if it
        // doesn't fit, or a push/break cycle would never terminate.
        let mut must_place_float =
            self.reflow_input.is_top_of_page && self.is_adjacent_with_b_start();

        // Band search: walk down band by band until the float fits (CSS 2.1
        // § 9.5.1 rules against overlap and overflow).
        let mut float_available_space =
            self.get_float_available_space_for_placing_float(wm, self.b_coord);
        loop {
            if self.reflow_input.available_block_size != MAX_AU &&
                float_available_space.rect.size.block <= Au::zero() &&
                !must_place_float
            {
                // No room left on this fragment.
                self.push_float_past_break(&mut float, float_cell);
                return PlaceFloatResult::ShouldPlaceInNextContinuation;
            }
            if self.can_place_float(float_margin_i_size, &float_available_space) {
                break;
            }
            self.b_coord += float_available_space.rect.size.block;
            float_available_space =
                self.get_float_available_space_for_placing_float(wm, self.b_coord);
            must_place_float = false;
        }

        let float_pos = LogicalVec2 {
            inline: match side {
                FloatSide::InlineStart => float_available_space.rect.start_corner.inline,
                FloatSide::InlineEnd => {
                    float_available_space.rect.max_inline_position() - float_margin_i_size
                },
            },
            // CSS 2.1 § 9.5.1 rule 4: the float's outer top may not be
            // higher than the top of its containing block.
            block: max(self.b_coord, self.content_b_start()),
        };

        // The band search may have moved the cursor down; the space below it
        // is what the float really gets.
        available_size = self.compute_available_size_for_float();

        // Reflow after the block position is known, so the float knows where
        // it would break.
        if !early_float_reflow {
            let has_float_pushed_down = self.b_coord != saved_b_coord;
            if float_is_top_of_page && has_float_pushed_down {
                // Other floats pushed this one down; its contents are not at
                // the top of the page and must not force a break from inside.
                debug_assert!(
                    !must_place_float,
                    "must_place_float shouldn't be set if we're not at the top-of-page"
                );
                float_is_top_of_page = false;
            }
            status = layout.reflow_float(
                &mut float,
                &FloatReflowInput {
                    available_size,
                    is_top_of_page: float_is_top_of_page,
                },
            );
        }
        if float.has_prev_in_flow {
            // Margins apply to one fragment only.
            float_margin.block_start = Au::zero();
        }
        if status.is_incomplete() {
            float_margin.block_end = Au::zero();
        }

        // A float that can't fit even by fragmenting itself, or that asks
        // for a break before it, moves to the next column/page wholesale.
        let is_truncated = available_size.block != MAX_AU && float.size.block > available_size.block;
        if (!float_is_top_of_page && is_truncated) || status.is_inline_break_before() {
            self.push_float_past_break(&mut float, float_cell);
            return PlaceFloatResult::ShouldPlaceInNextContinuation;
        }

        // break-inside: avoid. The reflow input's top-of-page flag can be
        // true with the float below the top, hence the extra position check.
        if self.content_b_size() != MAX_AU &&
            !must_place_float &&
            (!self.reflow_input.is_top_of_page || float_pos.block > Au::zero()) &&
            float.style.break_inside == BreakWithin::Avoid &&
            (!status.is_fully_complete() ||
                float.size.block + float_margin.block_sum() >
                    self.content_b_end() - float_pos.block) &&
            !float.has_prev_in_flow
        {
            self.push_float_past_break(&mut float, float_cell);
            return PlaceFloatResult::ShouldPlaceInNextContinuation;
        }

        // The border-box origin: margins in, then relative positioning.
        let origin = float_pos + float_margin.start_offset() + float.relative_offset;
        float.position = origin;

        let overflow =
            float.overflow_relative_to_parent(wm, self.reflow_input.container_size);
        self.float_overflow_areas.union_with(&overflow);

        // Register the margin-box region. A float that split takes up the
        // rest of the block-size, so no later float lands beside its
        // continuation.
        let mut region = float.margin_box_region(&float_margin);
        if status.is_incomplete() && self.content_b_size() != MAX_AU {
            region.size.block = max(region.size.block, self.content_b_size() - float_pos.block);
        }
        self.float_manager.add_float(float_cell, &float, region, side);
        float.store_region(region);

        // Damage wherever the region or the shape changed.
        if region != old_region || float.shape_invalidation_differs() {
            let damage_b_start =
                old_region.start_corner.block.min(region.start_corner.block);
            let damage_b_end = old_region.max_block_position().max(region.max_block_position());
            self.float_manager.include_in_damage(damage_b_start, damage_b_end);
        }
        float.refresh_shape_invalidation();

        if !status.is_fully_complete() {
            layout.split_float(&mut float, &status);
        } else {
            debug_assert!(!float.has_next_in_flow);
        }

        debug!(
            "placed float: side={:?} pos={:?} size={:?} region={:?}",
            side, float.position, float.size, region
        );
        PlaceFloatResult::Placed
    }

    /// Move a float to the next fragment: flag its side in the float manager
    /// so later, smaller floats don't land above it, record it on the
    /// pushed list, and mark this reflow overflow-incomplete.
    fn push_float_past_break(&mut self, float: &mut FloatFrame, float_cell: &ArcRefCell<FloatFrame>) {
        let side = float.style.used_float(self.reflow_input.writing_mode);
        self.float_manager.set_pushed_float_past_break(side);
        float.is_pushed = true;
        self.pushed_floats.push(float_cell.clone());
        self.reflow_status.set_overflow_incomplete();
        debug!("pushed float past break: side={:?}", side);
    }

    /// Place the floats that were deferred while the line was in progress.
    /// Call once the line is done, with the cursor below it.
    pub fn place_below_current_line_floats(
        &mut self,
        line: &mut LineBox,
        layout: &mut dyn FloatLayout,
    ) {
        debug_assert!(!self.below_current_line_floats.is_empty());
        let deferred = std::mem::take(&mut self.below_current_line_floats);
        let mut floats_placed_in_line: SmallVec<[ArcRefCell<FloatFrame>; 2]> = SmallVec::new();
        for float_cell in &deferred {
            let result = self.flow_and_place_float(float_cell, None, layout);
            debug_assert!(
                result != PlaceFloatResult::ShouldPlaceBelowCurrentLine,
                "already dealing with below-current-line floats"
            );
            if result == PlaceFloatResult::Placed {
                floats_placed_in_line.push(float_cell.clone());
            }
        }
        if floats_placed_in_line.len() != deferred.len() {
            line.set_had_float_pushed();
        }
        line.floats.extend(floats_placed_in_line);
    }

    /// Advance `b_coord` past floats per the `clear` value, and, when placing
    /// a float-avoiding block, keep advancing band by band until it fits.
    /// `FloatsPushedOrSplit` means clearing cannot complete on this
    /// fragment: the caller must push or break rather than continue here.
    pub fn clear_floats(
        &self,
        b_coord: Au,
        clear: Clear,
        avoiding: Option<&FloatAvoidingBlock>,
    ) -> (Au, ClearFloatsResult) {
        trace!("clear floats: in: b_coord={:?} clear={:?}", b_coord, clear);

        if !self.float_manager.has_any_floats() {
            return (b_coord, ClearFloatsResult::BCoordNoChange);
        }

        let mut new_b_coord = b_coord;
        if clear != Clear::None {
            new_b_coord = self.float_manager.clear_floats(new_b_coord, clear);
            if self.float_manager.clear_continues(clear) {
                return (new_b_coord, ClearFloatsResult::FloatsPushedOrSplit);
            }
        }

        if let Some(avoiding) = avoiding {
            loop {
                let float_available_space =
                    self.get_float_available_space(self.reflow_input.writing_mode, new_b_coord);
                if self.float_avoiding_block_fits_in_avail_space(avoiding, &float_available_space) {
                    break;
                }
                if !Self::advance_to_next_band(&float_available_space.rect, &mut new_b_coord) {
                    // Give up clearing here; we'll get pushed to the next
                    // column or page and try again there.
                    break;
                }
            }
        }

        trace!("clear floats: out: b_coord={:?}", new_b_coord);
        let result = if new_b_coord == b_coord {
            ClearFloatsResult::BCoordNoChange
        } else {
            ClearFloatsResult::BCoordAdvanced
        };
        (new_b_coord, result)
    }

    /// Step the coordinate past the current band. False when the band
    /// extends without bound, i.e. there is no next band.
    pub fn advance_to_next_band(float_available_space: &LogicalRect<Au>, b_coord: &mut Au) -> bool {
        if float_available_space.size.block == MAX_AU {
            return false;
        }
        *b_coord += float_available_space.size.block;
        true
    }
}

impl Drop for BlockReflowState<'_> {
    fn drop(&mut self) {
        // Commit the checkpoint taken at construction: the floats this block
        // placed belong to the formatting context, not to this pass's
        // bookkeeping.
        if let Some(key) = self.float_manager_checkpoint.take() {
            self.float_manager.forget_state(key);
        }
    }
}
