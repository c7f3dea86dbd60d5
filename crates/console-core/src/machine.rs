//! Top-level orchestrator: owns the `Cpu` and `Bus` and drives `step()` in
//! batches for a host driver loop (spec.md §5, §9's ownership tree).

use crate::bios::Bios;
use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::error::CoreResult;
use crate::frame_sink::FrameSink;

pub struct Machine {
    cpu: Cpu,
    bus: Bus,
}

impl Machine {
    pub fn new(bios: Bios, frame_sink: Box<dyn FrameSink>) -> Self {
        Machine {
            cpu: Cpu::new(),
            bus: Bus::new(bios, frame_sink),
        }
    }

    /// Load bytes into RAM at `offset`, for `--exe`-style sideloading.
    pub fn sideload_ram(&mut self, offset: usize, data: &[u8]) {
        self.bus.ram_mut().as_mut_slice()[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn pc(&self) -> u32 {
        self.cpu.pc()
    }

    /// Read a 32-bit word through the bus, for host-side inspection between
    /// steps (e.g. confirming a store did or didn't land).
    pub fn load32(&mut self, addr: u32) -> CoreResult<u32> {
        self.bus.load32(addr)
    }

    /// Drive one interpreter step. Host-fatal errors propagate; guest
    /// exceptions are handled internally (spec.md §4.6).
    pub fn step(&mut self) -> CoreResult<()> {
        self.cpu.step(&mut self.bus)
    }

    /// Run a batch of steps, stopping early on a host-fatal error
    /// (spec.md §5: "a batch of a million steps followed by a host-event
    /// poll").
    pub fn run_batch(&mut self, steps: u32) -> CoreResult<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingFrameSink;

    fn new_machine() -> Machine {
        let bios = Bios::new(vec![0u8; 512 * 1024]).unwrap();
        Machine::new(bios, Box::new(RecordingFrameSink::default()))
    }

    #[test]
    fn fresh_machine_starts_at_reset_vector() {
        let machine = new_machine();
        assert_eq!(machine.pc(), 0xBFC0_0000);
    }

    #[test]
    fn sideload_writes_bytes_into_ram() {
        let mut machine = new_machine();
        machine.sideload_ram(0, &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(machine.bus.load32(0).unwrap(), 0xEFBE_ADDE);
    }

    #[test]
    fn run_batch_executes_requested_step_count() {
        let mut machine = new_machine();
        // Every BIOS word is 0, which decodes to SLL $0,$0,0 (a real no-op).
        machine.run_batch(4).unwrap();
        assert_eq!(machine.pc(), 0xBFC0_0010);
    }
}
