// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-frame inputs to `compute_qp`.

/// Whether a frame is an intra-only refresh point or predicted from
/// previously decoded frames.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FrameType {
    Key,
    #[default]
    Inter,
}

/// Caller-supplied context for the frame about to be encoded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameParams {
    pub frame_type: FrameType,
    pub spatial_layer_id: u8,
    pub temporal_layer_id: u8,
}

impl FrameParams {
    pub fn key_frame(spatial_layer_id: u8, temporal_layer_id: u8) -> Self {
        Self { frame_type: FrameType::Key, spatial_layer_id, temporal_layer_id }
    }

    pub fn inter_frame(spatial_layer_id: u8, temporal_layer_id: u8) -> Self {
        Self { frame_type: FrameType::Inter, spatial_layer_id, temporal_layer_id }
    }
}
