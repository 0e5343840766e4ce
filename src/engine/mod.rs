// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Component H: the public six-operation surface (§6.1) and the dispatcher
//! that routes it to a per-codec engine.

mod av1;
mod common;
mod vp8;
mod vp9;

use crate::codec::{AlgoId, CodecKind};
use crate::config::RateControlConfig;
use crate::error::EngineError;
use crate::frame::FrameParams;

pub use av1::Av1Engine;
pub use vp8::Vp8Engine;
pub use vp9::Vp9Engine;

/// The six operations every codec-specific engine implements (§6.1),
/// translated from the spec's C-style status-code signatures into
/// idiomatic `Result`-returning methods. [`crate::Status`] remains
/// available as a thin projection of [`EngineError`] for callers that
/// bridge this crate to a C ABI; that bridge itself is out of scope here.
pub trait CodecRateController {
    /// Adopts `config` as the engine's active configuration, allocating
    /// fresh per-layer state. Must be called before any other operation.
    fn init(&mut self, config: &RateControlConfig) -> Result<(), EngineError>;

    /// Re-validates and adopts a new `config` for a running engine,
    /// preserving bandwidth/Q history when only the framerate changed
    /// (§4.G), and rebuilding per-layer state otherwise.
    fn update_config(&mut self, config: &RateControlConfig) -> Result<(), EngineError>;

    /// Runs components C-F for the frame described by `frame_params` and
    /// records the chosen qindex; retrieve it with [`Self::get_qp`].
    fn compute_qp(&mut self, frame_params: FrameParams) -> Result<(), EngineError>;

    /// The qindex chosen by the most recent [`Self::compute_qp`] call.
    fn get_qp(&self) -> i32;

    /// The loop filter level derived from the most recent qindex. VP8 and
    /// AV1 leave loop filter level selection to the encoder proper and
    /// always return `0` here (§4.J); VP9 derives it analytically.
    fn get_loop_filter_level(&self) -> i32;

    /// Feeds back the frame's actual encoded size in bytes so component F
    /// can update the rate-correction factor and component B can drain
    /// the buffer.
    fn post_encode_update(&mut self, encoded_frame_size_bytes: u64) -> Result<(), EngineError>;
}

/// A rate control engine for one of the three supported codecs. Wraps the
/// concrete per-codec engine behind a single type so callers don't need to
/// be generic over [`CodecRateController`] implementors.
#[derive(Debug)]
pub enum Engine {
    Vp8(Vp8Engine),
    Vp9(Vp9Engine),
    Av1(Av1Engine),
}

impl Engine {
    /// Creates an engine for `codec` using `algo` as the requested backend
    /// (§6.1 `create`). `AlgoId::Default` resolves to the codec's sole
    /// real backend; any other `algo` is checked against `codec` and
    /// rejected with [`EngineError::UnsupportedCodec`] on mismatch.
    pub fn create(codec: CodecKind, algo: AlgoId, bit_depth: crate::BitDepth) -> Result<Self, EngineError> {
        let resolved = algo.resolve(codec).ok_or(EngineError::UnsupportedCodec)?;
        Ok(match resolved {
            AlgoId::LibvpxVp8 => Engine::Vp8(Vp8Engine::new(bit_depth)),
            AlgoId::LibvpxVp9 => Engine::Vp9(Vp9Engine::new(bit_depth)),
            AlgoId::AomAv1 => Engine::Av1(Av1Engine::new(bit_depth)),
            AlgoId::Default | AlgoId::Unknown => return Err(EngineError::UnsupportedCodec),
        })
    }
}

impl CodecRateController for Engine {
    fn init(&mut self, config: &RateControlConfig) -> Result<(), EngineError> {
        match self {
            Engine::Vp8(e) => e.init(config),
            Engine::Vp9(e) => e.init(config),
            Engine::Av1(e) => e.init(config),
        }
    }

    fn update_config(&mut self, config: &RateControlConfig) -> Result<(), EngineError> {
        match self {
            Engine::Vp8(e) => e.update_config(config),
            Engine::Vp9(e) => e.update_config(config),
            Engine::Av1(e) => e.update_config(config),
        }
    }

    fn compute_qp(&mut self, frame_params: FrameParams) -> Result<(), EngineError> {
        match self {
            Engine::Vp8(e) => e.compute_qp(frame_params),
            Engine::Vp9(e) => e.compute_qp(frame_params),
            Engine::Av1(e) => e.compute_qp(frame_params),
        }
    }

    fn get_qp(&self) -> i32 {
        match self {
            Engine::Vp8(e) => e.get_qp(),
            Engine::Vp9(e) => e.get_qp(),
            Engine::Av1(e) => e.get_qp(),
        }
    }

    fn get_loop_filter_level(&self) -> i32 {
        match self {
            Engine::Vp8(e) => e.get_loop_filter_level(),
            Engine::Vp9(e) => e.get_loop_filter_level(),
            Engine::Av1(e) => e.get_loop_filter_level(),
        }
    }

    fn post_encode_update(&mut self, encoded_frame_size_bytes: u64) -> Result<(), EngineError> {
        match self {
            Engine::Vp8(e) => e.post_encode_update(encoded_frame_size_bytes),
            Engine::Vp9(e) => e.post_encode_update(encoded_frame_size_bytes),
            Engine::Av1(e) => e.post_encode_update(encoded_frame_size_bytes),
        }
    }
}
