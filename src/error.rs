// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The error taxonomy of §7, one `thiserror` enum per concern — mirrors the
//! split between `StatelessBackendError` and `NewPictureError` in the
//! reference crate's decoder module.

use thiserror::Error;

/// A single config field (or cross-field relationship) that failed
/// validation (§4.I).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("width/height {0}x{1} exceeds the codec's maximum {2}x{3}")]
    DimensionsOutOfRange(u32, u32, u32, u32),
    #[error("min_quantizer {0} must be <= max_quantizer {1}")]
    QuantizerRangeInverted(i32, i32),
    #[error("quantizer {0} is outside [0, 63]")]
    QuantizerOutOfRange(i32),
    #[error("undershoot/overshoot pct {0} is outside [0, {1}]")]
    AdaptationPctOutOfRange(i32, i32),
    #[error("ss_number_layers * ts_number_layers = {0} exceeds the codec's MAX_LAYERS {1}")]
    TooManyLayers(usize, usize),
    #[error("ss_number_layers {0} exceeds the codec's MAX_SPATIAL_LAYERS {1}")]
    TooManySpatialLayers(u8, u8),
    #[error("ts_number_layers {0} exceeds the codec's MAX_TEMPORAL_LAYERS {1}")]
    TooManyTemporalLayers(u8, u8),
    #[error("VP8 only supports a single spatial/temporal layer")]
    Vp8LayeringUnsupported,
    #[error("layer_target_bitrate is not non-decreasing with temporal id within spatial layer {0}")]
    BitrateNotMonotonic(u8),
    #[error("ts_rate_decimator[{0}] (top temporal layer) must be 1, got {1}")]
    TopDecimatorNotOne(usize, u32),
    #[error("ts_rate_decimator[{0}]={1} must be exactly twice ts_rate_decimator[{2}]={3}")]
    DecimatorNotDoubling(usize, u32, usize, u32),
    #[error("ss_number_layers and ts_number_layers must each be >= 1")]
    ZeroLayers,
    #[error("min_quantizers[{0}] {1} must be <= max_quantizers[{0}] {2}")]
    LayerQuantizerRangeInverted(usize, i32, i32),
}

/// Errors returned by the six-operation engine surface of §6.1/§7.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("no rate control backend for the requested codec/algorithm combination")]
    UnsupportedCodec,
    #[error("operation not implemented by this backend")]
    Unimplemented,
    #[error("operation called out of sequence: {0}")]
    InvalidState(&'static str),
}
