//! Primary and SPECIAL opcode semantics (spec.md §4.6). Dispatch is a plain
//! `match` on the opcode/funct field — on this target that compiles to a
//! jump table, giving the array-of-handlers structure the design notes ask
//! for without a hand-rolled `[fn; 64]` literal (SPEC_FULL.md §9).

use crate::bus::Bus;
use crate::error::{CoreError, CoreResult};

use super::instruction::Instruction;
use super::registers::Registers;
use super::Cpu;

impl Cpu {
    pub(super) fn execute(
        &mut self,
        instr: Instruction,
        bus: &mut Bus,
        out: &mut Registers,
    ) -> CoreResult<()> {
        match instr.opcode() {
            0x00 => self.execute_special(instr, out)?,
            0x01 => self.execute_regimm(instr, out)?,
            0x02 => self.op_j(instr)?,
            0x03 => self.op_jal(instr, out)?,
            0x04 => self.op_beq(instr, out)?,
            0x05 => self.op_bne(instr, out)?,
            0x06 => self.op_blez(instr, out)?,
            0x07 => self.op_bgtz(instr, out)?,
            0x08 => self.op_addi(instr, out)?,
            0x09 => self.op_addiu(instr, out),
            0x0A => self.op_slti(instr, out),
            0x0B => self.op_sltiu(instr, out),
            0x0C => self.op_andi(instr, out),
            0x0D => self.op_ori(instr, out),
            0x0E => self.op_xori(instr, out),
            0x0F => self.op_lui(instr, out),
            0x10 => self.op_cop0(instr, out)?,
            0x11 | 0x13 => return Err(CoreError::CoprocessorError { pc: self.current_pc }),
            0x12 => log::debug!("COP2 (GTE) instruction {:#010x}: unhandled, out of scope", instr.raw()),
            0x20 => self.op_lb(instr, bus, out)?,
            0x21 => self.op_lh(instr, bus, out)?,
            0x22 => self.op_lwl(instr, bus, out)?,
            0x23 => self.op_lw(instr, bus, out)?,
            0x24 => self.op_lbu(instr, bus, out)?,
            0x25 => self.op_lhu(instr, bus, out)?,
            0x26 => self.op_lwr(instr, bus, out)?,
            0x28 => self.op_sb(instr, bus, out)?,
            0x29 => self.op_sh(instr, bus, out)?,
            0x2A => self.op_swl(instr, bus, out)?,
            0x2B => self.op_sw(instr, bus, out)?,
            0x2E => self.op_swr(instr, bus, out)?,
            _ => {
                return Err(CoreError::IllegalInstruction {
                    instr: instr.raw(),
                    pc: self.current_pc,
                })
            }
        }
        Ok(())
    }

    fn execute_special(&mut self, instr: Instruction, out: &mut Registers) -> CoreResult<()> {
        match instr.funct() {
            0x00 => self.op_sll(instr, out),
            0x02 => self.op_srl(instr, out),
            0x03 => self.op_sra(instr, out),
            0x04 => self.op_sllv(instr, out),
            0x06 => self.op_srlv(instr, out),
            0x07 => self.op_srav(instr, out),
            0x08 => self.op_jr(instr)?,
            0x09 => self.op_jalr(instr, out)?,
            0x0C => return Err(CoreError::Syscall { pc: self.current_pc }),
            0x0D => return Err(CoreError::Break { pc: self.current_pc }),
            0x10 => self.op_mfhi(instr, out),
            0x11 => self.op_mthi(instr),
            0x12 => self.op_mflo(instr, out),
            0x13 => self.op_mtlo(instr),
            0x18 => self.op_mult(instr),
            0x19 => self.op_multu(instr),
            0x1A => self.op_div(instr),
            0x1B => self.op_divu(instr),
            0x20 => self.op_add(instr, out)?,
            0x21 => self.op_addu(instr, out),
            0x22 => self.op_sub(instr, out)?,
            0x23 => self.op_subu(instr, out),
            0x24 => self.op_and(instr, out),
            0x25 => self.op_or(instr, out),
            0x26 => self.op_xor(instr, out),
            0x27 => self.op_nor(instr, out),
            0x2A => self.op_slt(instr, out),
            0x2B => self.op_sltu(instr, out),
            _ => {
                return Err(CoreError::IllegalInstruction {
                    instr: instr.raw(),
                    pc: self.current_pc,
                })
            }
        }
        Ok(())
    }

    /// `BLTZ/BGEZ/BLTZAL/BGEZAL`, dispatched from primary opcode `0x01` by
    /// `rt` (spec.md §4.6, resolved open question: the link register for
    /// the `*AL` forms is `$ra` (r31), matching `JAL`).
    fn execute_regimm(&mut self, instr: Instruction, out: &mut Registers) -> CoreResult<()> {
        let rt = instr.rt();
        let take_if_ge_zero = rt & 1 != 0;
        let is_link_form = (rt >> 1) == 8;

        let value = self.regs.read(instr.rs()) as i32;
        let condition = if take_if_ge_zero { value >= 0 } else { value < 0 };

        if is_link_form {
            out.write(31, self.next_pc);
        }
        if condition {
            let target = self.pc_relative_branch_target(instr);
            self.set_branch_target(target)?;
        }
        Ok(())
    }

    // ---- branches & jumps --------------------------------------------

    fn op_beq(&mut self, instr: Instruction, _out: &mut Registers) -> CoreResult<()> {
        if self.regs.read(instr.rs()) == self.regs.read(instr.rt()) {
            let target = self.pc_relative_branch_target(instr);
            self.set_branch_target(target)?;
        }
        Ok(())
    }

    fn op_bne(&mut self, instr: Instruction, _out: &mut Registers) -> CoreResult<()> {
        if self.regs.read(instr.rs()) != self.regs.read(instr.rt()) {
            let target = self.pc_relative_branch_target(instr);
            self.set_branch_target(target)?;
        }
        Ok(())
    }

    fn op_blez(&mut self, instr: Instruction, _out: &mut Registers) -> CoreResult<()> {
        if (self.regs.read(instr.rs()) as i32) <= 0 {
            let target = self.pc_relative_branch_target(instr);
            self.set_branch_target(target)?;
        }
        Ok(())
    }

    fn op_bgtz(&mut self, instr: Instruction, _out: &mut Registers) -> CoreResult<()> {
        if (self.regs.read(instr.rs()) as i32) > 0 {
            let target = self.pc_relative_branch_target(instr);
            self.set_branch_target(target)?;
        }
        Ok(())
    }

    fn op_j(&mut self, instr: Instruction) -> CoreResult<()> {
        let target = (self.next_pc & 0xF000_0000) | (instr.target26() << 2);
        self.set_branch_target(target)
    }

    fn op_jal(&mut self, instr: Instruction, out: &mut Registers) -> CoreResult<()> {
        out.write(31, self.next_pc);
        let target = (self.next_pc & 0xF000_0000) | (instr.target26() << 2);
        self.set_branch_target(target)
    }

    fn op_jr(&mut self, instr: Instruction) -> CoreResult<()> {
        let target = self.regs.read(instr.rs());
        self.set_branch_target(target)
    }

    fn op_jalr(&mut self, instr: Instruction, out: &mut Registers) -> CoreResult<()> {
        let target = self.regs.read(instr.rs());
        out.write(instr.rd(), self.next_pc);
        self.set_branch_target(target)
    }

    // ---- arithmetic/logic ---------------------------------------------

    fn op_add(&mut self, instr: Instruction, out: &mut Registers) -> CoreResult<()> {
        let a = self.regs.read(instr.rs()) as i32;
        let b = self.regs.read(instr.rt()) as i32;
        let result = a
            .checked_add(b)
            .ok_or(CoreError::Overflow { pc: self.current_pc })?;
        out.write(instr.rd(), result as u32);
        Ok(())
    }

    fn op_addu(&mut self, instr: Instruction, out: &mut Registers) {
        let result = self.regs.read(instr.rs()).wrapping_add(self.regs.read(instr.rt()));
        out.write(instr.rd(), result);
    }

    fn op_sub(&mut self, instr: Instruction, out: &mut Registers) -> CoreResult<()> {
        let a = self.regs.read(instr.rs()) as i32;
        let b = self.regs.read(instr.rt()) as i32;
        let result = a
            .checked_sub(b)
            .ok_or(CoreError::Overflow { pc: self.current_pc })?;
        out.write(instr.rd(), result as u32);
        Ok(())
    }

    fn op_subu(&mut self, instr: Instruction, out: &mut Registers) {
        let result = self.regs.read(instr.rs()).wrapping_sub(self.regs.read(instr.rt()));
        out.write(instr.rd(), result);
    }

    fn op_addi(&mut self, instr: Instruction, out: &mut Registers) -> CoreResult<()> {
        let a = self.regs.read(instr.rs()) as i32;
        let imm = instr.imm16_se() as i32;
        let result = a
            .checked_add(imm)
            .ok_or(CoreError::Overflow { pc: self.current_pc })?;
        out.write(instr.rt(), result as u32);
        Ok(())
    }

    fn op_addiu(&mut self, instr: Instruction, out: &mut Registers) {
        let result = self.regs.read(instr.rs()).wrapping_add(instr.imm16_se());
        out.write(instr.rt(), result);
    }

    fn op_and(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), self.regs.read(instr.rs()) & self.regs.read(instr.rt()));
    }

    fn op_or(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), self.regs.read(instr.rs()) | self.regs.read(instr.rt()));
    }

    fn op_xor(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), self.regs.read(instr.rs()) ^ self.regs.read(instr.rt()));
    }

    fn op_nor(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), !(self.regs.read(instr.rs()) | self.regs.read(instr.rt())));
    }

    fn op_andi(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rt(), self.regs.read(instr.rs()) & instr.imm16());
    }

    fn op_ori(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rt(), self.regs.read(instr.rs()) | instr.imm16());
    }

    fn op_xori(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rt(), self.regs.read(instr.rs()) ^ instr.imm16());
    }

    fn op_lui(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rt(), instr.imm16() << 16);
    }

    fn op_slt(&mut self, instr: Instruction, out: &mut Registers) {
        let a = self.regs.read(instr.rs()) as i32;
        let b = self.regs.read(instr.rt()) as i32;
        out.write(instr.rd(), (a < b) as u32);
    }

    fn op_sltu(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), (self.regs.read(instr.rs()) < self.regs.read(instr.rt())) as u32);
    }

    fn op_slti(&mut self, instr: Instruction, out: &mut Registers) {
        let a = self.regs.read(instr.rs()) as i32;
        out.write(instr.rt(), (a < instr.imm16_se() as i32) as u32);
    }

    fn op_sltiu(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rt(), (self.regs.read(instr.rs()) < instr.imm16_se()) as u32);
    }

    // ---- shifts ---------------------------------------------------------

    fn op_sll(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), self.regs.read(instr.rt()) << instr.shamt());
    }

    fn op_srl(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), self.regs.read(instr.rt()) >> instr.shamt());
    }

    fn op_sra(&mut self, instr: Instruction, out: &mut Registers) {
        let value = (self.regs.read(instr.rt()) as i32) >> instr.shamt();
        out.write(instr.rd(), value as u32);
    }

    fn op_sllv(&mut self, instr: Instruction, out: &mut Registers) {
        let shift = self.regs.read(instr.rs()) & 0x1F;
        out.write(instr.rd(), self.regs.read(instr.rt()) << shift);
    }

    fn op_srlv(&mut self, instr: Instruction, out: &mut Registers) {
        let shift = self.regs.read(instr.rs()) & 0x1F;
        out.write(instr.rd(), self.regs.read(instr.rt()) >> shift);
    }

    fn op_srav(&mut self, instr: Instruction, out: &mut Registers) {
        let shift = self.regs.read(instr.rs()) & 0x1F;
        let value = (self.regs.read(instr.rt()) as i32) >> shift;
        out.write(instr.rd(), value as u32);
    }

    // ---- multiply / divide ----------------------------------------------

    fn op_mult(&mut self, instr: Instruction) {
        let a = self.regs.read(instr.rs()) as i32 as i64;
        let b = self.regs.read(instr.rt()) as i32 as i64;
        let result = (a * b) as u64;
        self.lo = result as u32;
        self.hi = (result >> 32) as u32;
    }

    fn op_multu(&mut self, instr: Instruction) {
        let a = self.regs.read(instr.rs()) as u64;
        let b = self.regs.read(instr.rt()) as u64;
        let result = a * b;
        self.lo = result as u32;
        self.hi = (result >> 32) as u32;
    }

    /// Divide-by-zero and the `INT_MIN / -1` overflow case both have
    /// documented fixed results rather than trapping (spec.md §4.6).
    fn op_div(&mut self, instr: Instruction) {
        let n = self.regs.read(instr.rs()) as i32;
        let d = self.regs.read(instr.rt()) as i32;
        if d == 0 {
            self.hi = n as u32;
            self.lo = if n >= 0 { 0xFFFF_FFFF } else { 1 };
        } else if n as u32 == 0x8000_0000 && d == -1 {
            self.hi = 0;
            self.lo = 0x8000_0000;
        } else {
            self.hi = (n % d) as u32;
            self.lo = (n / d) as u32;
        }
    }

    fn op_divu(&mut self, instr: Instruction) {
        let n = self.regs.read(instr.rs());
        let d = self.regs.read(instr.rt());
        if d == 0 {
            self.hi = n;
            self.lo = 0xFFFF_FFFF;
        } else {
            self.hi = n % d;
            self.lo = n / d;
        }
    }

    fn op_mfhi(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), self.hi);
    }

    fn op_mflo(&mut self, instr: Instruction, out: &mut Registers) {
        out.write(instr.rd(), self.lo);
    }

    fn op_mthi(&mut self, instr: Instruction) {
        self.hi = self.regs.read(instr.rs());
    }

    fn op_mtlo(&mut self, instr: Instruction) {
        self.lo = self.regs.read(instr.rs());
    }

    // ---- loads ------------------------------------------------------------

    fn op_lb(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        let value = (bus.load8(addr)? as i8) as i32 as u32;
        self.set_pending_load(instr.rt(), value);
        Ok(())
    }

    fn op_lbu(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        let value = bus.load8(addr)? as u32;
        self.set_pending_load(instr.rt(), value);
        Ok(())
    }

    fn op_lh(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        if addr % 2 != 0 {
            return Err(CoreError::LoadAddressError { addr, pc: self.current_pc });
        }
        let value = (bus.load16(addr)? as i16) as i32 as u32;
        self.set_pending_load(instr.rt(), value);
        Ok(())
    }

    fn op_lhu(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        if addr % 2 != 0 {
            return Err(CoreError::LoadAddressError { addr, pc: self.current_pc });
        }
        let value = bus.load16(addr)? as u32;
        self.set_pending_load(instr.rt(), value);
        Ok(())
    }

    fn op_lw(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        if addr % 4 != 0 {
            return Err(CoreError::LoadAddressError { addr, pc: self.current_pc });
        }
        let value = bus.load32(addr)?;
        self.set_pending_load(instr.rt(), value);
        Ok(())
    }

    /// Unaligned word load: merges the naturally-aligned word with the
    /// register's current value by the documented four-case table on the
    /// low two address bits (spec.md §4.6, §9). Not cache-isolation-gated
    /// (resolved open question: only stores are; see SPEC_FULL.md §F.2).
    fn op_lwl(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        let aligned = addr & !3;
        let mem = bus.load32(aligned)?;
        let old = self.regs.read(instr.rt());
        let value = match addr & 3 {
            0 => (old & 0x00FF_FFFF) | (mem << 24),
            1 => (old & 0x0000_FFFF) | (mem << 16),
            2 => (old & 0x0000_00FF) | (mem << 8),
            _ => mem,
        };
        self.set_pending_load(instr.rt(), value);
        Ok(())
    }

    fn op_lwr(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        let aligned = addr & !3;
        let mem = bus.load32(aligned)?;
        let old = self.regs.read(instr.rt());
        let value = match addr & 3 {
            0 => mem,
            1 => (old & 0xFF00_0000) | (mem >> 8),
            2 => (old & 0xFFFF_0000) | (mem >> 16),
            _ => (old & 0xFFFF_FF00) | (mem >> 24),
        };
        self.set_pending_load(instr.rt(), value);
        Ok(())
    }

    // ---- stores -----------------------------------------------------------

    fn op_sb(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        if self.cop0.cache_isolated() {
            return Ok(());
        }
        let addr = self.load_address(instr);
        bus.store8(addr, self.regs.read(instr.rt()) as u8)
    }

    fn op_sh(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        if addr % 2 != 0 {
            return Err(CoreError::StoreAddressError { addr, pc: self.current_pc });
        }
        if self.cop0.cache_isolated() {
            return Ok(());
        }
        bus.store16(addr, self.regs.read(instr.rt()) as u16)
    }

    fn op_sw(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        let addr = self.load_address(instr);
        if addr % 4 != 0 {
            return Err(CoreError::StoreAddressError { addr, pc: self.current_pc });
        }
        if self.cop0.cache_isolated() {
            return Ok(());
        }
        bus.store32(addr, self.regs.read(instr.rt()))
    }

    fn op_swl(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        if self.cop0.cache_isolated() {
            return Ok(());
        }
        let addr = self.load_address(instr);
        let aligned = addr & !3;
        let old_mem = bus.load32(aligned)?;
        let reg = self.regs.read(instr.rt());
        let value = match addr & 3 {
            0 => (old_mem & 0xFFFF_FF00) | (reg >> 24),
            1 => (old_mem & 0xFFFF_0000) | (reg >> 16),
            2 => (old_mem & 0xFF00_0000) | (reg >> 8),
            _ => reg,
        };
        bus.store32(aligned, value)
    }

    fn op_swr(&mut self, instr: Instruction, bus: &mut Bus, _out: &mut Registers) -> CoreResult<()> {
        if self.cop0.cache_isolated() {
            return Ok(());
        }
        let addr = self.load_address(instr);
        let aligned = addr & !3;
        let old_mem = bus.load32(aligned)?;
        let reg = self.regs.read(instr.rt());
        let value = match addr & 3 {
            0 => reg,
            1 => (old_mem & 0x0000_00FF) | (reg << 8),
            2 => (old_mem & 0x0000_FFFF) | (reg << 16),
            _ => (old_mem & 0x00FF_FFFF) | (reg << 24),
        };
        bus.store32(aligned, value)
    }

    fn load_address(&self, instr: Instruction) -> u32 {
        self.regs.read(instr.rs()).wrapping_add(instr.imm16_se())
    }

    // ---- COP0 -------------------------------------------------------------

    fn op_cop0(&mut self, instr: Instruction, _out: &mut Registers) -> CoreResult<()> {
        match instr.cop_op() {
            0x00 => {
                let value = self.cop0.read(instr.rd());
                self.set_pending_load(instr.rt(), value);
            }
            0x04 => {
                let value = self.regs.read(instr.rt());
                self.cop0.write(instr.rd(), value);
            }
            0x10 if instr.funct() == 0x10 => self.cop0.pop_exception_mode(),
            _ => return Err(CoreError::CoprocessorError { pc: self.current_pc }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::Bios;
    use crate::frame_sink::FrameSink;

    struct NullSink;
    impl FrameSink for NullSink {
        fn push_triangle(&mut self, _: [(i16, i16); 3], _: [(u8, u8, u8); 3]) {}
        fn push_quad(&mut self, _: [(i16, i16); 4], _: [(u8, u8, u8); 4]) {}
        fn set_draw_offset(&mut self, _: i16, _: i16) {}
        fn display(&mut self) {}
    }

    fn new_bus() -> Bus {
        let bios = Bios::new(vec![0u8; 512 * 1024]).unwrap();
        Bus::new(bios, Box::new(NullSink))
    }

    #[test]
    fn divu_by_zero_yields_documented_fixed_results() {
        let mut cpu = Cpu::new();
        cpu.regs.write(8, 42);
        cpu.regs.write(9, 0);
        cpu.op_divu(Instruction::new(0x0109_001B));
        assert_eq!(cpu.hi, 42);
        assert_eq!(cpu.lo, 0xFFFF_FFFF);
    }

    #[test]
    fn div_overflow_case_yields_documented_fixed_results() {
        let mut cpu = Cpu::new();
        cpu.regs.write(8, 0x8000_0000);
        cpu.regs.write(9, 0xFFFF_FFFF); // -1
        cpu.op_div(Instruction::new(0x0109_001A));
        assert_eq!(cpu.hi, 0);
        assert_eq!(cpu.lo, 0x8000_0000);
    }

    #[test]
    fn lwl_lwr_merge_by_low_two_address_bits() {
        let mut bus = new_bus();
        bus.store32(0, 0x0102_0304).unwrap();
        let mut cpu = Cpu::new();
        cpu.regs.write(9, 0); // base
        cpu.regs.write(8, 0xFFFF_FFFF); // old value of rt
        // LWL $8, 1($9) -> addr = 1
        let mut out = cpu.regs;
        cpu.op_lwl(Instruction::new(0x8928_0001), &mut bus, &mut out).unwrap();
        let (target, value) = cpu.pending_load.unwrap();
        assert_eq!(target, 8);
        assert_eq!(value, (0xFFFF_FFFF & 0x0000_FFFF) | (0x0102_0304 << 16));
    }

    #[test]
    fn swl_swr_preserve_untouched_bytes_of_target_word() {
        let mut bus = new_bus();
        bus.store32(0, 0xAABB_CCDD).unwrap();
        let mut cpu = Cpu::new();
        cpu.regs.write(9, 0);
        cpu.regs.write(8, 0x1122_3344);
        let mut out = cpu.regs;
        // SWL $8, 2($9) -> addr = 2
        cpu.op_swl(Instruction::new(0xA928_0002), &mut bus, &mut out).unwrap();
        assert_eq!(bus.load32(0).unwrap(), (0xAABB_CCDD & 0xFF00_0000) | (0x1122_3344 >> 8));
    }
}
