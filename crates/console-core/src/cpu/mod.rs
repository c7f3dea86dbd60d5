//! The MIPS R3000A-class interpreter: branch-delay/load-delay pipeline,
//! primary/SPECIAL opcode dispatch, and the exception pathway (spec.md §4.6).

mod cop0;
mod instruction;
mod ops;
mod registers;

use crate::bus::Bus;
use crate::error::{CoreError, CoreResult};

use cop0::Cop0;
use instruction::Instruction;
use registers::Registers;

/// Guest entry point on cold start (spec.md §6).
const RESET_VECTOR: u32 = 0xBFC0_0000;

/// Standard MIPS `CAUSE.ExcCode` values the exception pathway uses
/// (spec.md §4.6, §7); these match the documented R3000A encoding.
mod cause {
    pub const ADDRESS_LOAD: u32 = 4;
    pub const ADDRESS_STORE: u32 = 5;
    pub const SYSCALL: u32 = 8;
    pub const BREAKPOINT: u32 = 9;
    pub const RESERVED_INSTRUCTION: u32 = 10;
    pub const COPROCESSOR_UNUSABLE: u32 = 11;
    pub const OVERFLOW: u32 = 12;
}

fn cause_code(err: &CoreError) -> u32 {
    match err {
        CoreError::LoadAddressError { .. } => cause::ADDRESS_LOAD,
        CoreError::StoreAddressError { .. } => cause::ADDRESS_STORE,
        CoreError::Overflow { .. } => cause::OVERFLOW,
        CoreError::Syscall { .. } => cause::SYSCALL,
        CoreError::Break { .. } => cause::BREAKPOINT,
        CoreError::CoprocessorError { .. } => cause::COPROCESSOR_UNUSABLE,
        CoreError::IllegalInstruction { .. } => cause::RESERVED_INSTRUCTION,
        _ => unreachable!("{err:?} is not guest-recoverable"),
    }
}

pub struct Cpu {
    regs: Registers,
    hi: u32,
    lo: u32,
    pc: u32,
    next_pc: u32,
    current_pc: u32,
    pending_load: Option<(u8, u32)>,
    branching: bool,
    in_delay_slot: bool,
    cop0: Cop0,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            regs: Registers::filled_with(0),
            hi: 0,
            lo: 0,
            pc: RESET_VECTOR,
            next_pc: RESET_VECTOR.wrapping_add(4),
            current_pc: RESET_VECTOR,
            pending_load: None,
            branching: false,
            in_delay_slot: false,
            cop0: Cop0::new(),
        }
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn reg(&self, index: u8) -> u32 {
        self.regs.read(index)
    }

    pub fn hi(&self) -> u32 {
        self.hi
    }

    pub fn lo(&self) -> u32 {
        self.lo
    }

    /// One interpreter step: fetch, snapshot delay flags, advance PC, commit
    /// the pending load, decode/execute, swap register buffers (spec.md
    /// §4.6). Host-fatal errors propagate; guest-recoverable ones are
    /// absorbed into a CPU exception and `step` returns `Ok`.
    pub fn step(&mut self, bus: &mut Bus) -> CoreResult<()> {
        let instr = Instruction::new(bus.load32(self.pc)?);

        self.in_delay_slot = self.branching;
        self.branching = false;
        self.current_pc = self.pc;
        self.pc = self.next_pc;
        self.next_pc = self.next_pc.wrapping_add(4);

        let mut out = self.regs;
        if let Some((index, value)) = self.pending_load.take() {
            out.write(index, value);
        }

        match self.execute(instr, bus, &mut out) {
            Ok(()) => {}
            Err(e) if e.is_guest_recoverable() => self.exception(cause_code(&e)),
            Err(e) => return Err(e),
        }

        self.regs = out;
        Ok(())
    }

    /// Enter the exception handler (spec.md §4.6): select the vector from
    /// the BEV bit, push the SR mode stack, record `CAUSE`/`EPC`.
    fn exception(&mut self, code: u32) {
        let handler = if self.cop0.bev() {
            0xBFC0_0180
        } else {
            0x8000_0080
        };

        self.cop0.push_exception_mode();

        let mut raw_cause = code << 2;
        let mut epc = self.current_pc;
        if self.in_delay_slot {
            raw_cause |= 1 << 31;
            epc = epc.wrapping_sub(4);
        }
        self.cop0.cause = raw_cause;
        self.cop0.epc = epc;

        self.pc = handler;
        self.next_pc = handler.wrapping_add(4);
    }

    /// Queue a value for the load-delay pair; committed at the start of the
    /// *next* step. A second queued load to the same target silently
    /// supersedes the first (spec.md §3).
    fn set_pending_load(&mut self, target: u8, value: u32) {
        self.pending_load = Some((target, value));
    }

    /// Validate and install a branch/jump target (spec.md §4.6: "require
    /// the next `next_pc` to be 4-aligned; otherwise raise
    /// `LoadAddressError`").
    fn set_branch_target(&mut self, target: u32) -> CoreResult<()> {
        if target % 4 != 0 {
            return Err(CoreError::LoadAddressError {
                addr: target,
                pc: self.current_pc,
            });
        }
        self.next_pc = target;
        self.branching = true;
        Ok(())
    }

    fn pc_relative_branch_target(&self, instr: Instruction) -> u32 {
        self.next_pc.wrapping_add(instr.imm16_se() << 2)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
