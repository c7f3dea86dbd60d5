//! Execution core for a fifth-generation home console: a MIPS R3000A-class
//! interpreter, a unified memory bus with memory-mapped peripherals, a DMA
//! controller, and a GPU command dispatcher (spec.md §1, §2).
//!
//! This crate never rasterizes, presents a frame, loads a BIOS image from
//! disk, or runs a host event loop — those are the embedder's job via
//! [`frame_sink::FrameSink`] and [`machine::Machine`] (spec.md §1 Non-goals).

pub mod address_map;
pub mod bios;
pub mod bus;
pub mod cpu;
pub mod dma;
pub mod error;
pub mod frame_sink;
pub mod gpu;
pub mod machine;
pub mod ram;

#[cfg(test)]
pub(crate) mod test_support;
