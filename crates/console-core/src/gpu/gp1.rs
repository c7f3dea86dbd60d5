//! GP1 control port: immediate commands (spec.md §4.5), grounded on
//! `gpu/gpu.go`'s `GP1` dispatch.

use crate::error::{CoreError, CoreResult};

use super::types::{DisplayDepth, DmaDirection, Gp0Mode, HorizontalRes, VerticalRes, VideoMode};
use super::Gpu;

impl Gpu {
    pub fn gp1(&mut self, word: u32) -> CoreResult<()> {
        let opcode = (word >> 24) as u8;
        match opcode {
            0x00 => self.gp1_reset(),
            0x01 => self.gp1_reset_command_buffer(),
            0x02 => self.gp1_acknowledge_interrupt(),
            0x03 => self.gp1_display_enable(word),
            0x04 => self.gp1_set_dma_direction(word),
            0x05 => self.gp1_set_display_vram_start(word),
            0x06 => self.gp1_set_horizontal_display_range(word),
            0x07 => self.gp1_set_vertical_display_range(word),
            0x08 => self.gp1_display_mode(word),
            _ => return Err(CoreError::UnknownGp1 { opcode, word }),
        }
        Ok(())
    }

    /// `00` soft reset: defaults restored, FIFO cleared (spec.md §4.5).
    fn gp1_reset(&mut self) {
        self.stat = super::stat::GpuStat::new();
        self.display_vram_x_start = 0;
        self.display_vram_y_start = 0;
        self.display_horiz_start = 0x200;
        self.display_horiz_end = 0x200 + 2560;
        self.display_line_start = 0x010;
        self.display_line_end = 0x010 + 240;
        self.gp1_reset_command_buffer();
    }

    fn gp1_reset_command_buffer(&mut self) {
        self.gp0_fifo.clear();
        self.gp0_remaining = 0;
        self.gp0_descriptor = None;
        self.gp0_mode = Gp0Mode::Command;
    }

    fn gp1_acknowledge_interrupt(&mut self) {
        self.stat.interrupt_request = false;
    }

    fn gp1_display_enable(&mut self, word: u32) {
        self.stat.display_disabled = word & 1 != 0;
    }

    fn gp1_set_dma_direction(&mut self, word: u32) {
        self.stat.dma_direction = DmaDirection::from_field(word);
    }

    fn gp1_set_display_vram_start(&mut self, word: u32) {
        self.display_vram_x_start = (word & 0x3FE) as u16;
        self.display_vram_y_start = ((word >> 10) & 0x1FF) as u16;
    }

    fn gp1_set_horizontal_display_range(&mut self, word: u32) {
        self.display_horiz_start = (word & 0xFFF) as u16;
        self.display_horiz_end = ((word >> 12) & 0xFFF) as u16;
    }

    fn gp1_set_vertical_display_range(&mut self, word: u32) {
        self.display_line_start = (word & 0x3FF) as u16;
        self.display_line_end = ((word >> 10) & 0x3FF) as u16;
    }

    /// `08` display mode: hres1/hres2/vres/video-mode/display-depth/
    /// vertical-interlace/flip (spec.md §4.5). Bit 7 (horizontal flip) is a
    /// logged no-op rather than the original's panic (SPEC_FULL.md §F.4).
    fn gp1_display_mode(&mut self, word: u32) {
        let hr1 = (word & 3) as u8;
        let hr2 = ((word >> 6) & 1) as u8;
        self.stat.horizontal_res = HorizontalRes::from_fields(hr1, hr2);
        self.stat.vertical_res = VerticalRes::from_bit(word & 0x4 != 0);
        self.stat.video_mode = VideoMode::from_bit(word & 0x8 != 0);
        self.stat.display_depth = DisplayDepth::from_bit(word & 0x10 != 0);
        self.stat.vertical_interlace = word & 0x20 != 0;
        if word & 0x80 != 0 {
            log::debug!("GP1(08h) horizontal flip bit set: no-op on this core");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingFrameSink;

    fn new_gpu() -> Gpu {
        Gpu::new(Box::new(RecordingFrameSink::default()))
    }

    #[test]
    fn soft_reset_restores_display_defaults_and_clears_fifo() {
        let mut gpu = new_gpu();
        gpu.gp0(0x2800_0000).unwrap(); // start a 5-word command, leave it pending
        gpu.gp1(0x0000_0000).unwrap();
        assert_eq!(gpu.display_horiz_start, 0x200);
        assert_eq!(gpu.display_horiz_end, 0x200 + 2560);
        assert_eq!(gpu.display_line_start, 0x010);
        assert_eq!(gpu.display_line_end, 0x010 + 240);
        assert_eq!(gpu.gp0_remaining, 0);
    }

    #[test]
    fn display_mode_sets_resolution_and_video_mode() {
        let mut gpu = new_gpu();
        gpu.gp1(0x0800_003F).unwrap(); // hres1=3, vres 480, pal, 24bit, interlace
        assert_eq!(gpu.stat.vertical_res, VerticalRes::Y480Lines);
        assert_eq!(gpu.stat.video_mode, VideoMode::Pal);
    }

    #[test]
    fn unknown_gp1_opcode_errors() {
        let mut gpu = new_gpu();
        let err = gpu.gp1(0xFF00_0000).unwrap_err();
        assert!(matches!(err, CoreError::UnknownGp1 { opcode: 0xFF, .. }));
    }

    #[test]
    fn display_vram_start_forces_x_bit0_zero() {
        let mut gpu = new_gpu();
        gpu.gp1(0x0500_0005).unwrap(); // x = 5 -> bit 0 forced zero -> 4
        assert_eq!(gpu.display_vram_x_start, 4);
    }
}
