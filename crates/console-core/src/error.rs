//! Error taxonomy for the execution core.
//!
//! Every kind named in the specification's error table has a variant here.
//! Guest-recoverable kinds (see [`CoreError::is_guest_recoverable`]) are
//! caught inside [`crate::cpu::Cpu::step`] and turned into a guest exception;
//! they never escape [`crate::machine::Machine::step`] as an `Err`. Host-fatal
//! kinds propagate out and the caller is expected to abort with the
//! diagnostic the variant carries.

use thiserror::Error;

/// Result alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("BIOS image size mismatch: expected {expected} bytes, got {actual}")]
    BiosSizeMismatch { expected: usize, actual: usize },

    #[error("failed to read BIOS image: {reason}")]
    BiosReadFailed { reason: String },

    #[error("SYSCTL write of wrong expansion base at offset {offset:#x}: expected {expected:#010x}, got {actual:#010x}")]
    BadExpansionBase {
        offset: u32,
        expected: u32,
        actual: u32,
    },

    #[error("unclassified 8-bit load at {addr:#010x}")]
    UnknownLoad8 { addr: u32 },
    #[error("unclassified 16-bit load at {addr:#010x}")]
    UnknownLoad16 { addr: u32 },
    #[error("unclassified 32-bit load at {addr:#010x}")]
    UnknownLoad32 { addr: u32 },

    #[error("unclassified 8-bit store at {addr:#010x}")]
    UnknownStore8 { addr: u32 },
    #[error("unclassified 16-bit store at {addr:#010x}")]
    UnknownStore16 { addr: u32 },
    #[error("unclassified 32-bit store at {addr:#010x}")]
    UnknownStore32 { addr: u32 },

    #[error("unknown GP0 opcode {opcode:#04x} (word {word:#010x})")]
    UnknownGp0 { opcode: u8, word: u32 },
    #[error("unknown GP1 opcode {opcode:#04x} (word {word:#010x})")]
    UnknownGp1 { opcode: u8, word: u32 },

    #[error("unhandled DMA combination: port {port:?} direction {direction:?}")]
    UnhandledDma {
        port: crate::dma::Port,
        direction: crate::dma::Direction,
    },

    #[error("load address error at {addr:#010x} (pc {pc:#010x})")]
    LoadAddressError { addr: u32, pc: u32 },
    #[error("store address error at {addr:#010x} (pc {pc:#010x})")]
    StoreAddressError { addr: u32, pc: u32 },

    #[error("signed overflow at pc {pc:#010x}")]
    Overflow { pc: u32 },

    #[error("syscall at pc {pc:#010x}")]
    Syscall { pc: u32 },
    #[error("break at pc {pc:#010x}")]
    Break { pc: u32 },
    #[error("coprocessor error at pc {pc:#010x}")]
    CoprocessorError { pc: u32 },
    #[error("illegal instruction {instr:#010x} at pc {pc:#010x}")]
    IllegalInstruction { instr: u32, pc: u32 },
}

impl CoreError {
    /// True for the kinds the CPU catches and converts into a guest
    /// exception rather than propagating to the host (spec.md §7).
    pub fn is_guest_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::LoadAddressError { .. }
                | CoreError::StoreAddressError { .. }
                | CoreError::Overflow { .. }
                | CoreError::Syscall { .. }
                | CoreError::Break { .. }
                | CoreError::CoprocessorError { .. }
                | CoreError::IllegalInstruction { .. }
        )
    }
}
