/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Incremental block-and-float layout.
//!
//! This crate implements the stateful core of block reflow for a web-style
//! layout engine: positioning a block's children line by line while floats
//! intrude on the available space, placing the floats themselves, handling
//! `clear`, deferring floats that no longer fit their line, pushing floats
//! past pagination breaks, and replaying float state when reflow resumes in
//! the middle of a block instead of at its top.
//!
//! The box tree, style resolution, and painting live elsewhere. The engine
//! consumes resolved style and geometry through [`flow::ReflowInput`] and
//! [`flow::float::FloatFrame`], calls back into its host through the
//! [`flow::FloatLayout`] and [`flow::line::LineLayout`] traits, and produces
//! position decisions plus float-manager state.

pub mod cell;
pub mod flow;
pub mod geom;
pub mod style_ext;

pub use crate::flow::float::FloatManager;
pub use crate::flow::{BlockReflowOptions, BlockReflowState, ReflowInput};
