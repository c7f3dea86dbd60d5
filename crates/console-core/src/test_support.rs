//! Shared test-only `FrameSink` used by unit tests across the crate.

use crate::frame_sink::{Color, FrameSink, Position};

#[derive(Default)]
pub(crate) struct RecordingFrameSink {
    pub triangles: Vec<([Position; 3], [Color; 3])>,
    pub quads: Vec<([Position; 4], [Color; 4])>,
    pub draw_offset: Option<(i16, i16)>,
    pub display_calls: u32,
}

impl FrameSink for RecordingFrameSink {
    fn push_triangle(&mut self, positions: [Position; 3], colors: [Color; 3]) {
        self.triangles.push((positions, colors));
    }

    fn push_quad(&mut self, positions: [Position; 4], colors: [Color; 4]) {
        self.quads.push((positions, colors));
    }

    fn set_draw_offset(&mut self, x: i16, y: i16) {
        self.draw_offset = Some((x, y));
    }

    fn display(&mut self) {
        self.display_calls += 1;
    }
}
