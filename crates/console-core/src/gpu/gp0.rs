//! GP0 command dispatch: the variable-length command FIFO state machine
//! (spec.md §4.5), grounded on `gpu/gp0.go`'s `gp0Commands` table and
//! handler functions.

use crate::error::{CoreError, CoreResult};

use super::types::{color_from_gp0, position_from_gp0, Gp0Mode};
use super::Gpu;

pub(super) struct Descriptor {
    opcode: u8,
    expected_length: u32,
    handler: fn(&mut Gpu, &[u32]) -> CoreResult<()>,
}

/// Fixed command table: opcode, total FIFO words (the opcode word itself
/// counts toward the length, SPEC_FULL.md §F.3), and handler.
const TABLE: &[Descriptor] = &[
    Descriptor { opcode: 0x00, expected_length: 1, handler: nop },
    Descriptor { opcode: 0x01, expected_length: 1, handler: clear_cache },
    Descriptor { opcode: 0x28, expected_length: 5, handler: mono_quad_opaque },
    Descriptor { opcode: 0x2C, expected_length: 9, handler: quad_blended_opaque },
    Descriptor { opcode: 0x30, expected_length: 6, handler: tri_shaded_opaque },
    Descriptor { opcode: 0x38, expected_length: 8, handler: quad_shaded_opaque },
    Descriptor { opcode: 0xA0, expected_length: 3, handler: image_load },
    Descriptor { opcode: 0xC0, expected_length: 3, handler: image_store },
    Descriptor { opcode: 0xE1, expected_length: 1, handler: draw_mode },
    Descriptor { opcode: 0xE2, expected_length: 1, handler: set_texture_window },
    Descriptor { opcode: 0xE3, expected_length: 1, handler: set_draw_area_top_left },
    Descriptor { opcode: 0xE4, expected_length: 1, handler: set_draw_area_bottom_right },
    Descriptor { opcode: 0xE5, expected_length: 1, handler: set_draw_offset },
    Descriptor { opcode: 0xE6, expected_length: 1, handler: set_mask_bit_setting },
];

fn lookup(opcode: u8) -> Option<&'static Descriptor> {
    TABLE.iter().find(|d| d.opcode == opcode)
}

impl Gpu {
    /// Drive the GP0 command FIFO with one more word (spec.md §4.5).
    pub fn gp0(&mut self, word: u32) -> CoreResult<()> {
        if self.gp0_remaining == 0 {
            let opcode = (word >> 24) as u8;
            let desc = lookup(opcode).ok_or(CoreError::UnknownGp0 { opcode, word })?;
            self.gp0_remaining = desc.expected_length;
            self.gp0_descriptor = Some(desc);
            self.gp0_fifo.clear();
        }
        self.gp0_remaining -= 1;

        match self.gp0_mode {
            Gp0Mode::Command => {
                self.gp0_fifo.push(word);
                if self.gp0_remaining == 0 {
                    let desc = self.gp0_descriptor.take().expect("descriptor set above");
                    let words = std::mem::take(&mut self.gp0_fifo);
                    (desc.handler)(self, &words)?;
                }
            }
            Gp0Mode::ImageLoad => {
                // Pixel data is not persisted in this core (spec.md §4.5).
                if self.gp0_remaining == 0 {
                    self.gp0_mode = Gp0Mode::Command;
                }
            }
        }
        Ok(())
    }
}

fn nop(_gpu: &mut Gpu, _words: &[u32]) -> CoreResult<()> {
    Ok(())
}

fn clear_cache(_gpu: &mut Gpu, _words: &[u32]) -> CoreResult<()> {
    log::debug!("GP0(01h) clear cache: no-op on this core");
    Ok(())
}

fn mono_quad_opaque(gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let color = color_from_gp0(words[0]);
    let positions = [
        position_from_gp0(words[1]),
        position_from_gp0(words[2]),
        position_from_gp0(words[3]),
        position_from_gp0(words[4]),
    ];
    gpu.frame_sink.push_quad(positions, [color; 4]);
    Ok(())
}

fn quad_blended_opaque(_gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    log::debug!("GP0(2Ch) textured blended quad: stub, fifo={:?}", words);
    Ok(())
}

fn tri_shaded_opaque(_gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    log::debug!("GP0(30h) shaded triangle: stub, fifo={:?}", words);
    Ok(())
}

fn quad_shaded_opaque(_gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    log::debug!("GP0(38h) shaded quad: stub, fifo={:?}", words);
    Ok(())
}

fn image_load(gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let res = words[2];
    let width = res & 0xFFFF;
    let height = res >> 16;
    let size = width.wrapping_mul(height);
    let size = (size + 1) & !1u32;
    gpu.gp0_remaining = size / 2;
    gpu.gp0_mode = Gp0Mode::ImageLoad;
    Ok(())
}

fn image_store(_gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let res = words[2];
    log::debug!(
        "GP0(C0h) image store: stub, width={} height={}",
        res & 0xFFFF,
        res >> 16
    );
    Ok(())
}

fn draw_mode(gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let val = words[0];
    let stat = &mut gpu.stat;
    stat.page_base_x = (val & 0xF) as u8;
    stat.page_base_y = ((val >> 4) & 1) as u8;
    stat.semi_transparency = ((val >> 5) & 3) as u8;
    stat.texture_depth = super::types::TextureDepth::from_field((val >> 7) & 3);
    stat.dithering = (val >> 9) & 1 != 0;
    stat.allow_draw_to_display = (val >> 10) & 1 != 0;
    stat.force_set_mask_bit = (val >> 11) & 1 != 0;
    Ok(())
}

fn set_texture_window(gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let val = words[0];
    gpu.tex_window_x_mask = (val & 0x1F) as u8;
    gpu.tex_window_y_mask = ((val >> 5) & 0x1F) as u8;
    gpu.tex_window_x_offset = ((val >> 10) & 0x1F) as u8;
    gpu.tex_window_y_offset = ((val >> 15) & 0x1F) as u8;
    Ok(())
}

fn set_draw_area_top_left(gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let val = words[0];
    gpu.draw_area_top = ((val >> 10) & 0x3FF) as u16;
    gpu.draw_area_left = (val & 0x3FF) as u16;
    Ok(())
}

fn set_draw_area_bottom_right(gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let val = words[0];
    gpu.draw_area_bottom = ((val >> 10) & 0x3FF) as u16;
    gpu.draw_area_right = (val & 0x3FF) as u16;
    Ok(())
}

fn set_draw_offset(gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let val = words[0];
    let x = (val & 0x7FF) as u16;
    let y = ((val >> 11) & 0x7FF) as u16;
    // 11-bit two's complement: sign-extend via shift-left-then-arithmetic-shift-right.
    let x = ((x << 5) as i16) >> 5;
    let y = ((y << 5) as i16) >> 5;
    gpu.draw_x_offset = x;
    gpu.draw_y_offset = y;
    gpu.frame_sink.set_draw_offset(x, y);
    Ok(())
}

fn set_mask_bit_setting(gpu: &mut Gpu, words: &[u32]) -> CoreResult<()> {
    let val = words[0];
    gpu.stat.force_set_mask_bit = val & 1 != 0;
    gpu.check_mask_before_draw = val & 2 != 0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::Gpu;
    use crate::test_support::RecordingFrameSink;

    #[test]
    fn unknown_opcode_errors() {
        let mut gpu = Gpu::new(Box::new(RecordingFrameSink::default()));
        let err = gpu.gp0(0xFF00_0000).unwrap_err();
        assert!(matches!(err, CoreError::UnknownGp0 { opcode: 0xFF, .. }));
    }

    #[test]
    fn mono_quad_collects_five_words_then_pushes() {
        let sink = Box::new(RecordingFrameSink::default());
        let mut gpu = Gpu::new(sink);
        gpu.gp0(0x2800_FF00).unwrap(); // opcode + color (r=0,g=0xff,b=0)
        gpu.gp0(0x0000_0010).unwrap();
        gpu.gp0(0x0000_0020).unwrap();
        gpu.gp0(0x0010_0030).unwrap();
        assert_eq!(gpu.gp0_remaining, 1);
        gpu.gp0(0x0010_0040).unwrap();
        assert_eq!(gpu.gp0_remaining, 0);
    }

    #[test]
    fn image_load_switches_mode_and_counts_words() {
        let mut gpu = Gpu::new(Box::new(RecordingFrameSink::default()));
        gpu.gp0(0xA000_0000).unwrap();
        gpu.gp0(0x0000_0000).unwrap();
        // width=4, height=1 -> 4 pixels -> 2 words
        gpu.gp0(0x0001_0004).unwrap();
        assert_eq!(gpu.gp0_mode, Gp0Mode::ImageLoad);
        assert_eq!(gpu.gp0_remaining, 2);
        gpu.gp0(0xDEAD_BEEF).unwrap();
        gpu.gp0(0xDEAD_BEEF).unwrap();
        assert_eq!(gpu.gp0_mode, Gp0Mode::Command);
    }

    #[test]
    fn draw_offset_sign_extends_11_bits() {
        let mut gpu = Gpu::new(Box::new(RecordingFrameSink::default()));
        // x = -1 (0x7FF), y = 5
        let val = 0x7FF | (5 << 11);
        gpu.gp0(0xE500_0000 | (val & 0x00FF_FFFF)).unwrap();
        assert_eq!(gpu.draw_x_offset, -1);
        assert_eq!(gpu.draw_y_offset, 5);
    }
}
