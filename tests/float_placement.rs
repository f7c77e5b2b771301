/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! End-to-end float placement: a block driver reflowing lines and floats
//! against the public API, then resuming incrementally.

use app_units::Au;
use blockflow::cell::ArcRefCell;
use blockflow::flow::float::{FloatFrame, FloatManager};
use blockflow::flow::line::{LineBox, LineLayout};
use blockflow::flow::{
    BlockReflowOptions, BlockReflowState, CollapsedMargin, FloatLayout, FloatReflowInput,
    ReflowInput, ReflowStatus,
};
use blockflow::geom::{LogicalRect, LogicalSides, LogicalVec2, WritingMode};
use blockflow::style_ext::{Clear, FloatStyle};

fn px(value: i32) -> Au {
    Au(value * 60)
}

/// Gives every float its computed inline size and a fixed block size.
struct FixedHeight(Au);

impl FloatLayout for FixedHeight {
    fn reflow_float(&mut self, float: &mut FloatFrame, _input: &FloatReflowInput) -> ReflowStatus {
        float.size = LogicalVec2 {
            inline: float.computed_inline_size,
            block: self.0,
        };
        ReflowStatus::new()
    }

    fn split_float(&mut self, float: &mut FloatFrame, _status: &ReflowStatus) {
        float.has_next_in_flow = true;
    }
}

#[derive(Default)]
struct RecordingLine {
    empty: bool,
    bands: Vec<LogicalRect<Au>>,
    had_float_pushed: bool,
}

impl LineLayout for RecordingLine {
    fn line_is_empty(&self) -> bool {
        self.empty
    }

    fn update_band(&mut self, _mode: WritingMode, available_space: &LogicalRect<Au>) {
        self.bands.push(*available_space);
    }

    fn set_had_float_pushed(&mut self) {
        self.had_float_pushed = true;
    }
}

fn float(style: FloatStyle, inline_size: Au) -> ArcRefCell<FloatFrame> {
    ArcRefCell::new(FloatFrame::new(style, LogicalSides::zero(), inline_size))
}

#[test]
fn block_with_lines_and_floats_then_incremental_resume() {
    let input = ReflowInput::unconstrained(px(400));
    let mut manager = FloatManager::new(input.writing_mode);
    let mut layout = FixedHeight(px(60));
    let wm = input.writing_mode;

    let mut lines: Vec<LineBox> = Vec::new();
    {
        let mut state = BlockReflowState::new(&input, &mut manager, &BlockReflowOptions::default());

        // First line starts empty; its float places immediately at the
        // content origin and the line learns about the narrower band.
        let mut inline1 = RecordingLine {
            empty: true,
            ..RecordingLine::default()
        };
        let l1 = float(FloatStyle::left(), px(100));
        assert!(state.add_float(&mut inline1, &l1, Au(0), &mut layout));
        assert_eq!(l1.borrow().position, LogicalVec2 {
            inline: Au(0),
            block: Au(0),
        });
        assert_eq!(inline1.bands.len(), 1);
        assert_eq!(inline1.bands[0].start_corner.inline, px(100));
        assert!(!inline1.had_float_pushed);

        let mut line1 = LineBox::new_inline(false);
        line1.floats.extend(state.take_current_line_floats());
        lines.push(line1);
        state.b_coord = px(20);

        // Second line: an end-side float placed mid-line, then one too wide
        // for the remaining budget, then one that would fit but defers
        // anyway to keep source order.
        let mut inline2 = RecordingLine::default();
        let r1 = float(FloatStyle::right(), px(120));
        assert!(state.add_float(&mut inline2, &r1, px(200), &mut layout));
        assert_eq!(r1.borrow().position, LogicalVec2 {
            inline: px(280),
            block: px(20),
        });

        let l2 = float(FloatStyle::left(), px(250));
        assert!(state.add_float(&mut inline2, &l2, px(150), &mut layout));
        let l3 = float(FloatStyle::left(), px(10));
        assert!(state.add_float(&mut inline2, &l3, px(150), &mut layout));
        assert!(state.has_below_current_line_floats());

        let mut line2 = LineBox::new_inline(false);
        line2.floats.extend(state.take_current_line_floats());
        state.b_coord = px(40);
        state.place_below_current_line_floats(&mut line2, &mut layout);
        assert!(!line2.had_float_pushed());
        // The wide float skipped the occupied bands; the narrow one kept
        // source order and sits beside it.
        assert_eq!(l2.borrow().position, LogicalVec2 {
            inline: Au(0),
            block: px(60),
        });
        assert_eq!(l3.borrow().position, LogicalVec2 {
            inline: px(250),
            block: px(60),
        });
        lines.push(line2);

        // Everything placed is visible to clearing and to overflow.
        let (cleared, _) = state.clear_floats(px(80), Clear::Both, None);
        assert_eq!(cleared, px(120));
        let overflow = state.float_overflow_areas();
        assert_eq!(overflow.ink.origin.x, Au(0));
        assert_eq!(overflow.ink.origin.y, Au(0));
        assert_eq!(overflow.ink.size.width, px(400));
        assert_eq!(overflow.ink.size.height, px(120));

        assert_eq!(state.float_manager().placed_floats().count(), 4);
        assert!(!state.float_manager().damage().is_empty());
    }

    // The state dropped; its floats are committed to the formatting context.
    assert_eq!(manager.placed_floats().count(), 4);
    let damage = manager.take_damage();
    assert!(!damage.is_empty());
    assert!(manager.damage().is_empty());
    let band_before = manager_band(&manager, &input, px(70));

    // Resume at the end of the block in a fresh pass: the live manager state
    // is gone, so replay each line's floats, slid down by 15px.
    let mut manager = FloatManager::new(input.writing_mode);
    {
        let mut state = BlockReflowState::new(&input, &mut manager, &BlockReflowOptions::default());
        state.reconstruct_margin_before(&lines, lines.len());
        assert_eq!(state.prev_b_end_margin.solve(), Au(0));
        for line in &lines {
            state.recover_state_from(line, px(15));
        }
        let band_after = state.get_float_available_space(wm, px(70) + px(15));
        assert_eq!(band_after.rect.size.inline, band_before.rect.size.inline);
        assert_eq!(
            band_after.rect.start_corner.inline,
            band_before.rect.start_corner.inline
        );
    }
}

fn manager_band(
    manager: &FloatManager,
    input: &ReflowInput,
    b_coord: Au,
) -> blockflow::flow::float::FlowAreaRect {
    use blockflow::flow::float::{BandInfoType, ShapeType};
    manager.get_flow_area(
        input.writing_mode,
        b_coord,
        BandInfoType::BandFromPoint,
        app_units::MAX_AU,
        LogicalRect {
            start_corner: LogicalVec2 {
                inline: Au(0),
                block: Au(0),
            },
            size: LogicalVec2 {
                inline: input.computed_inline_size,
                block: app_units::MAX_AU,
            },
        },
        ShapeType::Margin,
        None,
    )
}

#[test]
fn margin_reconstruction_walks_past_empty_lines() {
    let input = ReflowInput::unconstrained(px(300));
    let mut manager = FloatManager::new(input.writing_mode);
    let mut state = BlockReflowState::new(&input, &mut manager, &BlockReflowOptions::default());

    let lines = vec![
        LineBox::new_block(CollapsedMargin::new(px(9))),
        LineBox::new_inline(true),
    ];
    state.reconstruct_margin_before(&lines, 2);
    assert_eq!(state.prev_b_end_margin.solve(), px(9));
}
