// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Real-time bitrate rate control for VP8, VP9, and AV1.
//!
//! This crate computes, for each frame an encoder is about to produce, a
//! quantization parameter (and, where applicable, a loop-filter level) such
//! that the long-run output bitrate converges on a caller-specified target
//! while respecting a simulated decoder buffer (HRD) model.
//!
//! The [`engine`] module contains the public six-operation surface
//! (`create`/`init`/`update_config`/`compute_qp`/`get_qp`/
//! `get_loop_filter_level`/`post_encode_update`) and the per-codec engines
//! that implement it. Everything under [`qindex`], [`buffer`], [`target`],
//! [`active_q`], [`qsearch`], [`rate_correction`], and [`svc`] is the shared
//! numeric machinery those engines are built from.
//!
//! This crate does not produce bitstreams, perform motion estimation, or
//! make frame-drop decisions; it only picks a quantizer.

pub mod active_q;
pub mod bitdepth;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod qindex;
pub mod qsearch;
pub mod rate_correction;
pub mod state;
pub mod status;
pub mod svc;
pub mod target;

pub use bitdepth::BitDepth;
pub use codec::{AlgoId, CodecKind};
pub use config::RateControlConfig;
pub use engine::Engine;
pub use error::{ConfigError, EngineError};
pub use frame::{FrameParams, FrameType};
pub use status::Status;

/// A frame resolution in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn get_area(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Number of 16x16 macroblocks covering this resolution, rounded up.
    pub fn macroblocks(&self) -> u32 {
        let mb_w = self.width.div_ceil(16);
        let mb_h = self.height.div_ceil(16);
        mb_w * mb_h
    }
}

impl From<(u32, u32)> for Resolution {
    fn from(value: (u32, u32)) -> Self {
        Self { width: value.0, height: value.1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macroblocks_rounds_up() {
        let res = Resolution::new(1280, 720);
        assert_eq!(res.macroblocks(), 80 * 45);

        let odd = Resolution::new(1, 1);
        assert_eq!(odd.macroblocks(), 1);
    }
}
