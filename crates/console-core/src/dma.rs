//! DMA controller: seven channels, global control/interrupt registers, and
//! the register-packing rules for `ChannelControl` (spec.md §3, §4.4).
//!
//! The block/linked-list transfer *engines* themselves live in
//! [`crate::bus::Bus::run_dma`], since running a transfer means pumping
//! words between RAM and the GPU — both of which the Bus owns, not this
//! module (spec.md §9's ownership tree: the DMA engine reaches RAM/GPU only
//! through the Bus that co-owns them). This module is the register file:
//! `DPCR`/`DICR`, per-channel `MADR`/`BCR`/`CHCR`, and the pure pack/unpack
//! and activation-predicate logic the engine consults.

/// One of the seven fixed DMA ports, in register order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    MdecIn,
    MdecOut,
    Gpu,
    CdRom,
    Spu,
    Pio,
    Otc,
}

impl Port {
    const ALL: [Port; 7] = [
        Port::MdecIn,
        Port::MdecOut,
        Port::Gpu,
        Port::CdRom,
        Port::Spu,
        Port::Pio,
        Port::Otc,
    ];

    fn index(self) -> usize {
        match self {
            Port::MdecIn => 0,
            Port::MdecOut => 1,
            Port::Gpu => 2,
            Port::CdRom => 3,
            Port::Spu => 4,
            Port::Pio => 5,
            Port::Otc => 6,
        }
    }

    fn from_index(i: usize) -> Port {
        Port::ALL[i]
    }
}

/// Transfer direction bit (`CHCR` bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToRam,
    FromRam,
}

/// Address step bit (`CHCR` bit 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Increment,
    Decrement,
}

/// Synchronization mode (`CHCR` bits 9-10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Manual,
    Request,
    LinkedList,
    Reserved,
}

/// The packed channel control register (`CHCR`), spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelControl {
    pub direction: Direction,
    pub step: Step,
    pub chopping: bool,
    pub sync_mode: SyncMode,
    pub chop_dma_size: u8,
    pub chop_cpu_size: u8,
    pub enable: bool,
    pub trigger: bool,
    /// Bits 29-31, preserved verbatim on pack/unpack but otherwise unused.
    pub upper: u8,
}

impl ChannelControl {
    fn unpack(raw: u32) -> Self {
        let direction = if raw & 1 != 0 {
            Direction::FromRam
        } else {
            Direction::ToRam
        };
        let step = if raw & (1 << 1) != 0 {
            Step::Decrement
        } else {
            Step::Increment
        };
        let chopping = raw & (1 << 8) != 0;
        let sync_mode = match (raw >> 9) & 0b11 {
            0 => SyncMode::Manual,
            1 => SyncMode::Request,
            2 => SyncMode::LinkedList,
            _ => SyncMode::Reserved,
        };
        let chop_dma_size = ((raw >> 16) & 0b111) as u8;
        let chop_cpu_size = ((raw >> 20) & 0b111) as u8;
        let enable = raw & (1 << 24) != 0;
        let trigger = raw & (1 << 28) != 0;
        let upper = ((raw >> 29) & 0b111) as u8;
        ChannelControl {
            direction,
            step,
            chopping,
            sync_mode,
            chop_dma_size,
            chop_cpu_size,
            enable,
            trigger,
            upper,
        }
    }

    fn pack(self) -> u32 {
        let mut raw = 0u32;
        if matches!(self.direction, Direction::FromRam) {
            raw |= 1;
        }
        if matches!(self.step, Step::Decrement) {
            raw |= 1 << 1;
        }
        if self.chopping {
            raw |= 1 << 8;
        }
        let sync_bits: u32 = match self.sync_mode {
            SyncMode::Manual => 0,
            SyncMode::Request => 1,
            SyncMode::LinkedList => 2,
            SyncMode::Reserved => 3,
        };
        raw |= sync_bits << 9;
        raw |= (self.chop_dma_size as u32 & 0b111) << 16;
        raw |= (self.chop_cpu_size as u32 & 0b111) << 20;
        if self.enable {
            raw |= 1 << 24;
        }
        if self.trigger {
            raw |= 1 << 28;
        }
        raw |= (self.upper as u32 & 0b111) << 29;
        raw
    }

    /// A channel is active iff `enable` and (sync mode isn't Manual, or
    /// `trigger` is set) — spec.md §3.
    pub fn is_active(&self) -> bool {
        self.enable && (!matches!(self.sync_mode, SyncMode::Manual) || self.trigger)
    }
}

impl Default for ChannelControl {
    fn default() -> Self {
        ChannelControl::unpack(0)
    }
}

/// Per-channel register file: `MADR` (base address), `BCR` (block
/// size/count), and `CHCR` (control).
#[derive(Debug, Clone, Copy, Default)]
struct Channel {
    base: u32,
    block_size: u16,
    block_count: u16,
    control: ChannelControl,
}

impl Channel {
    fn bcr(&self) -> u32 {
        (self.block_count as u32) << 16 | self.block_size as u32
    }

    fn set_bcr(&mut self, value: u32) {
        self.block_size = value as u16;
        self.block_count = (value >> 16) as u16;
    }

    /// Transfer size for Manual/Request sync modes (spec.md §4.4). Returns
    /// `None` for LinkedList, whose size is determined by walking RAM.
    fn transfer_size(&self) -> Option<u32> {
        match self.control.sync_mode {
            SyncMode::Manual => Some(self.block_size as u32),
            SyncMode::Request => Some(self.block_size as u32 * self.block_count as u32),
            SyncMode::LinkedList | SyncMode::Reserved => None,
        }
    }
}

/// Global `DICR` fields, spec.md §3 plus the bit layout recovered from
/// `original_source/memory/dma.go` (SPEC_FULL.md §F.1).
#[derive(Debug, Clone, Copy, Default)]
struct Dicr {
    irq_control: u8,      // bits 0-6
    force_irq: bool,      // bit 15
    channel_enable: u8,   // bits 16-22
    master_enable: bool,  // bit 23
    channel_flags: u8,    // bits 24-30, write-1-to-clear
}

impl Dicr {
    fn master_irq(&self) -> bool {
        self.force_irq
            || (self.master_enable && (self.channel_enable & self.channel_flags) != 0)
    }

    fn read(&self) -> u32 {
        let mut raw = 0u32;
        raw |= self.irq_control as u32 & 0x7F;
        if self.force_irq {
            raw |= 1 << 15;
        }
        raw |= (self.channel_enable as u32 & 0x7F) << 16;
        if self.master_enable {
            raw |= 1 << 23;
        }
        raw |= (self.channel_flags as u32 & 0x7F) << 24;
        if self.master_irq() {
            raw |= 1 << 31;
        }
        raw
    }

    fn write(&mut self, value: u32) {
        self.irq_control = (value & 0x7F) as u8;
        self.force_irq = value & (1 << 15) != 0;
        self.channel_enable = ((value >> 16) & 0x7F) as u8;
        self.master_enable = value & (1 << 23) != 0;
        let clear_mask = ((value >> 24) & 0x7F) as u8;
        self.channel_flags &= !clear_mask;
    }
}

pub struct Dma {
    channels: [Channel; 7],
    dpcr: u32,
    dicr: Dicr,
}

/// Per-channel register block is 16 bytes: MADR, BCR, CHCR, and a padding
/// word. DPCR/DICR follow immediately after the seventh channel.
const CHANNEL_STRIDE: u32 = 0x10;
const DPCR_OFFSET: u32 = 0x70;
const DICR_OFFSET: u32 = 0x74;

impl Dma {
    pub fn new() -> Self {
        Dma {
            channels: [Channel::default(); 7],
            dpcr: 0x0765_4321,
            dicr: Dicr::default(),
        }
    }

    pub fn dpcr(&self) -> u32 {
        self.dpcr
    }

    pub fn madr(&self, port: Port) -> u32 {
        self.channels[port.index()].base
    }

    pub fn chcr_raw(&self, port: Port) -> u32 {
        self.channels[port.index()].control.pack()
    }

    pub fn control(&self, port: Port) -> ChannelControl {
        self.channels[port.index()].control
    }

    pub fn transfer_size(&self, port: Port) -> Option<u32> {
        self.channels[port.index()].transfer_size()
    }

    pub fn step(&self, port: Port) -> Step {
        self.channels[port.index()].control.step
    }

    pub fn direction(&self, port: Port) -> Direction {
        self.channels[port.index()].control.direction
    }

    /// Clears `enable`/`trigger` once a transfer engine finishes draining
    /// `port` (spec.md §4.4, "On completion").
    pub fn finish(&mut self, port: Port) {
        let control = &mut self.channels[port.index()].control;
        control.enable = false;
        control.trigger = false;
    }

    /// Read a register at `offset` within the DMA region (spec.md §3's 128
    /// byte window). Unknown offsets inside channel blocks (the padding
    /// word) read back 0.
    pub fn read_register(&self, offset: u32) -> u32 {
        if offset == DPCR_OFFSET {
            return self.dpcr;
        }
        if offset == DICR_OFFSET {
            return self.dicr.read();
        }
        let channel_index = (offset / CHANNEL_STRIDE) as usize;
        if channel_index >= 7 {
            return 0;
        }
        let channel = &self.channels[channel_index];
        match offset % CHANNEL_STRIDE {
            0x0 => channel.base,
            0x4 => channel.bcr(),
            0x8 => channel.control.pack(),
            _ => 0,
        }
    }

    /// Writes a register and, if the write leaves that channel active
    /// (spec.md §4.4's activation rule), returns the port the Bus should
    /// drain via `run_dma`.
    pub fn write_register(&mut self, offset: u32, value: u32) -> Option<Port> {
        if offset == DPCR_OFFSET {
            self.dpcr = value;
            return None;
        }
        if offset == DICR_OFFSET {
            self.dicr.write(value);
            return None;
        }
        let channel_index = (offset / CHANNEL_STRIDE) as usize;
        if channel_index >= 7 {
            return None;
        }
        let port = Port::from_index(channel_index);
        let channel = &mut self.channels[channel_index];
        match offset % CHANNEL_STRIDE {
            0x0 => channel.base = value & 0x00FF_FFFF,
            0x4 => channel.set_bcr(value),
            0x8 => channel.control = ChannelControl::unpack(value),
            _ => return None,
        }
        if channel.control.is_active() {
            Some(port)
        } else {
            None
        }
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpcr_resets_to_documented_value() {
        assert_eq!(Dma::new().dpcr(), 0x0765_4321);
    }

    #[test]
    fn channel_control_pack_unpack_round_trips_preserved_bits() {
        // Bits this struct models: 0,1,8,9-10,16-18,20-22,24,28,29-31.
        const MODELED_MASK: u32 = 0xF177_0703;
        for raw in [0x0000_0000u32, 0x0105_0301, 0xE000_0000, 0x1100_0301] {
            let unpacked = ChannelControl::unpack(raw);
            assert_eq!(unpacked.pack(), raw & MODELED_MASK);
        }
    }

    #[test]
    fn manual_sync_is_active_only_with_enable() {
        let mut dma = Dma::new();
        // CHCR for OTC: direction to-RAM(0), step decrement(bit1), sync
        // Manual (bits 9-10 = 00), enable (bit24) + trigger (bit28).
        let chcr = (1 << 1) | (1 << 24) | (1 << 28);
        let port = dma.write_register(0x60 + 0x8, chcr);
        assert_eq!(port, Some(Port::Otc));
        assert!(dma.control(Port::Otc).is_active());
    }

    #[test]
    fn request_sync_active_without_trigger() {
        let mut dma = Dma::new();
        let chcr = (1 << 9) | (1 << 24); // sync=Request, enable set, no trigger
        let port = dma.write_register(0x20 + 0x8, chcr); // channel 2 = GPU
        assert_eq!(port, Some(Port::Gpu));
    }

    #[test]
    fn finish_clears_enable_and_trigger() {
        let mut dma = Dma::new();
        dma.write_register(0x60 + 0x8, (1 << 24) | (1 << 28));
        dma.finish(Port::Otc);
        assert!(!dma.control(Port::Otc).is_active());
        assert_eq!(dma.chcr_raw(Port::Otc) & (1 << 24), 0);
        assert_eq!(dma.chcr_raw(Port::Otc) & (1 << 28), 0);
    }

    #[test]
    fn dicr_write_is_w1c_on_flags_and_plain_rw_on_master_enable() {
        let mut dma = Dma::new();
        dma.write_register(DICR_OFFSET, 1 << 23); // set master_enable
        assert_eq!(dma.read_register(DICR_OFFSET) & (1 << 23), 1 << 23);
        // Raise channel_flags bit 0 (bit 24) out of band, then clear it.
        dma.dicr.channel_flags = 0b1;
        dma.write_register(DICR_OFFSET, (1 << 23) | (1 << 24));
        assert_eq!(dma.dicr.channel_flags, 0);
    }

    #[test]
    fn bcr_packs_block_size_low_and_count_high() {
        let mut dma = Dma::new();
        dma.write_register(0x20 + 0x4, (2u32 << 16) | 4);
        assert_eq!(dma.read_register(0x20 + 0x4), (2u32 << 16) | 4);
        dma.write_register(0x20 + 0x8, 1 << 9); // sync = Request
        assert_eq!(dma.transfer_size(Port::Gpu), Some(8));
    }
}
