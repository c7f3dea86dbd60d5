//! The GPU command dispatcher: two ports (GP0 drawing/mode, GP1 control),
//! `GPUSTAT`, and the state the draw-mode/texture-window/draw-area/
//! draw-offset/mask-bit commands configure (spec.md §3, §4.5).

mod gp0;
mod gp1;
mod stat;
pub mod types;

pub use stat::GpuStat;
pub use types::{
    color_from_gp0, position_from_gp0, DisplayDepth, DmaDirection, Gp0Mode, HorizontalRes,
    TextureDepth, VerticalRes, VideoMode,
};

use crate::frame_sink::FrameSink;

/// Command FIFO capacity (spec.md §3).
const FIFO_CAPACITY: usize = 12;

pub struct Gpu {
    stat: GpuStat,

    tex_window_x_mask: u8,
    tex_window_y_mask: u8,
    tex_window_x_offset: u8,
    tex_window_y_offset: u8,

    draw_area_left: u16,
    draw_area_top: u16,
    draw_area_right: u16,
    draw_area_bottom: u16,

    draw_x_offset: i16,
    draw_y_offset: i16,

    check_mask_before_draw: bool,

    display_vram_x_start: u16,
    display_vram_y_start: u16,
    display_horiz_start: u16,
    display_horiz_end: u16,
    display_line_start: u16,
    display_line_end: u16,

    gp0_fifo: Vec<u32>,
    gp0_remaining: u32,
    gp0_descriptor: Option<&'static gp0::Descriptor>,
    gp0_mode: Gp0Mode,

    frame_sink: Box<dyn FrameSink>,
}

impl Gpu {
    pub fn new(frame_sink: Box<dyn FrameSink>) -> Self {
        Gpu {
            stat: GpuStat::new(),
            tex_window_x_mask: 0,
            tex_window_y_mask: 0,
            tex_window_x_offset: 0,
            tex_window_y_offset: 0,
            draw_area_left: 0,
            draw_area_top: 0,
            draw_area_right: 0,
            draw_area_bottom: 0,
            draw_x_offset: 0,
            draw_y_offset: 0,
            check_mask_before_draw: false,
            display_vram_x_start: 0,
            display_vram_y_start: 0,
            display_horiz_start: 0x200,
            display_horiz_end: 0x200 + 2560,
            display_line_start: 0x010,
            display_line_end: 0x010 + 240,
            gp0_fifo: Vec::with_capacity(FIFO_CAPACITY),
            gp0_remaining: 0,
            gp0_descriptor: None,
            gp0_mode: Gp0Mode::Command,
            frame_sink,
        }
    }

    /// `GPUSTAT`, read via the GP1 port (spec.md §3/§4.5).
    pub fn status(&self) -> u32 {
        self.stat.as_u32()
    }

    /// `GPUREAD`: stub, always 0 (spec.md §4.5).
    pub fn read(&self) -> u32 {
        log::trace!("GPUREAD: not implemented, returning 0");
        0
    }

    pub fn display(&mut self) {
        self.frame_sink.display();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingFrameSink;

    #[test]
    fn fifo_capacity_matches_documented_size() {
        assert_eq!(FIFO_CAPACITY, 12);
    }

    #[test]
    fn new_gpu_has_display_disabled() {
        let gpu = Gpu::new(Box::new(RecordingFrameSink::default()));
        assert_ne!(gpu.status() & (1 << 23), 0);
    }
}
