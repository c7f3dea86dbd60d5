//! `GPUSTAT`: the 32-bit GPU status register (spec.md §3, §4.5), grounded
//! on `gpu/gpustat.go`'s field layout and `Status()` assembly.

use super::types::{DisplayDepth, DmaDirection, HorizontalRes, TextureDepth, VerticalRes, VideoMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuStat {
    pub page_base_x: u8,
    pub page_base_y: u8,
    pub semi_transparency: u8,
    pub texture_depth: TextureDepth,
    pub dithering: bool,
    pub allow_draw_to_display: bool,
    pub force_set_mask_bit: bool,
    pub avoid_draw_on_mask: bool,
    pub interlace_field: bool,
    pub horizontal_res: HorizontalRes,
    pub vertical_res: VerticalRes,
    pub video_mode: VideoMode,
    pub display_depth: DisplayDepth,
    pub vertical_interlace: bool,
    pub display_disabled: bool,
    pub interrupt_request: bool,
    pub dma_direction: DmaDirection,
}

impl GpuStat {
    pub fn new() -> Self {
        GpuStat {
            page_base_x: 0,
            page_base_y: 0,
            semi_transparency: 0,
            texture_depth: TextureDepth::T4Bit,
            dithering: false,
            allow_draw_to_display: false,
            force_set_mask_bit: false,
            avoid_draw_on_mask: false,
            interlace_field: true,
            horizontal_res: HorizontalRes::default(),
            vertical_res: VerticalRes::Y240Lines,
            video_mode: VideoMode::Ntsc,
            display_depth: DisplayDepth::D15Bit,
            vertical_interlace: false,
            display_disabled: true,
            interrupt_request: false,
            dma_direction: DmaDirection::Off,
        }
    }

    /// Assemble the 24 stored fields plus the three permanently-set ready
    /// bits and the derived data-request bit (spec.md §4.5). Bit 14
    /// (the original's disabled "flip horizontally" field) and bit 31
    /// stay reserved at 0 (SPEC_FULL.md §F.5).
    pub fn as_u32(&self) -> u32 {
        let mut r: u32 = 0;
        r |= self.page_base_x as u32;
        r |= (self.page_base_y as u32) << 4;
        r |= (self.semi_transparency as u32) << 5;
        r |= self.texture_depth.as_field() << 7;
        r |= (self.dithering as u32) << 9;
        r |= (self.allow_draw_to_display as u32) << 10;
        r |= (self.force_set_mask_bit as u32) << 11;
        r |= (self.avoid_draw_on_mask as u32) << 12;
        r |= (self.interlace_field as u32) << 13;
        // bit 14 reserved
        r |= self.horizontal_res.as_field() << 16;
        r |= (self.vertical_res.as_bit() as u32) << 19;
        r |= (self.video_mode.as_bit() as u32) << 20;
        r |= (self.display_depth.as_bit() as u32) << 21;
        r |= (self.vertical_interlace as u32) << 22;
        r |= (self.display_disabled as u32) << 23;
        r |= (self.interrupt_request as u32) << 24;
        // Ready bits permanently advertised set (spec.md §4.5).
        r |= 1 << 26; // ready_cmd
        r |= 1 << 27; // ready_vram_send
        r |= 1 << 28; // ready_dma
        r |= self.dma_direction.as_field() << 29;
        r |= self.data_request(r) << 25;
        r
    }

    /// Disassemble a raw GPUSTAT word back into its 24 stored fields
    /// (spec.md §8's GPUSTAT round-trip property). The three ready bits and
    /// the derived data-request bit are not stored fields and are dropped;
    /// re-assembling via [`Self::as_u32`] recomputes them.
    pub fn from_u32(raw: u32) -> Self {
        GpuStat {
            page_base_x: (raw & 0xF) as u8,
            page_base_y: ((raw >> 4) & 1) as u8,
            semi_transparency: ((raw >> 5) & 0b11) as u8,
            texture_depth: TextureDepth::from_field((raw >> 7) & 0b11),
            dithering: (raw >> 9) & 1 != 0,
            allow_draw_to_display: (raw >> 10) & 1 != 0,
            force_set_mask_bit: (raw >> 11) & 1 != 0,
            avoid_draw_on_mask: (raw >> 12) & 1 != 0,
            interlace_field: (raw >> 13) & 1 != 0,
            horizontal_res: HorizontalRes::from_packed(raw >> 16),
            vertical_res: VerticalRes::from_bit((raw >> 19) & 1 != 0),
            video_mode: VideoMode::from_bit((raw >> 20) & 1 != 0),
            display_depth: DisplayDepth::from_bit((raw >> 21) & 1 != 0),
            vertical_interlace: (raw >> 22) & 1 != 0,
            display_disabled: (raw >> 23) & 1 != 0,
            interrupt_request: (raw >> 24) & 1 != 0,
            dma_direction: DmaDirection::from_field(raw >> 29),
        }
    }

    /// Bit 25: derived from `dma_direction` against the already-assembled
    /// ready bits (spec.md §4.5).
    fn data_request(&self, partial: u32) -> u32 {
        match self.dma_direction {
            DmaDirection::Off => 0,
            DmaDirection::Fifo => 1,
            DmaDirection::CpuToGp0 => (partial >> 28) & 1,
            DmaDirection::GpuReadToCpu => (partial >> 27) & 1,
        }
    }
}

impl Default for GpuStat {
    fn default() -> Self {
        Self::new()
    }
}
