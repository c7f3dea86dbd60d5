//! Command-line front end: loads a BIOS image (and an optional PS-EXE-style
//! sideload), then drives the emulation step loop in batches (SPEC_FULL.md
//! §D). No host event loop or rasterization is implemented here, matching
//! spec.md §1's Non-goals.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console_core::bios::Bios;
use console_core::frame_sink::{Color, FrameSink, Position};
use console_core::machine::Machine;

/// Steps executed per batch before control returns to `main`'s loop, mirroring
/// spec.md §5's "batch of steps, then a host poll" shape with the poll
/// omitted (out of scope here).
const BATCH_SIZE: u32 = 1_000_000;

/// Number of batches to run before exiting cleanly. Chosen so a BIOS with no
/// host to talk to still terminates rather than looping forever.
const BATCH_COUNT: u32 = 1;

const PSEXE_HEADER_LEN: usize = 0x800;
const PSEXE_MAGIC: &[u8; 8] = b"PS-X EXE";

#[derive(Parser, Debug)]
#[command(name = "console-cli", about = "Run a BIOS image against the console execution core")]
struct Args {
    /// Flat 512 KiB BIOS image.
    bios_path: PathBuf,

    /// Optional PS-EXE-style binary to sideload into RAM before the run loop
    /// starts.
    #[arg(long, value_name = "PATH")]
    exe: Option<PathBuf>,

    /// Raise the log filter to `debug` for the whole process.
    #[arg(short, long)]
    verbose: bool,
}

/// Logging `FrameSink` used when no real presentation surface exists: every
/// draw call is recorded at `debug!` instead of rasterized, matching
/// SPEC_FULL.md §B's "informative-stub" convention.
struct LoggingFrameSink {
    frames: u32,
}

impl FrameSink for LoggingFrameSink {
    fn push_triangle(&mut self, positions: [Position; 3], colors: [Color; 3]) {
        log::debug!("triangle {positions:?} {colors:?}");
    }

    fn push_quad(&mut self, positions: [Position; 4], colors: [Color; 4]) {
        log::debug!("quad {positions:?} {colors:?}");
    }

    fn set_draw_offset(&mut self, x: i16, y: i16) {
        log::debug!("draw offset ({x}, {y})");
    }

    fn display(&mut self) {
        self.frames += 1;
        log::debug!("display (frame {})", self.frames);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn load_bios(path: &PathBuf) -> Result<Bios> {
    let bytes = fs::read(path).with_context(|| format!("reading BIOS image {path:?}"))?;
    Bios::new(bytes).map_err(|e| anyhow::anyhow!("{e}"))
}

/// Parses a PS-X EXE header and returns `(destination_address, payload)`.
/// The header is a fixed 0x800-byte block: an 8-byte magic, the initial PC at
/// offset 0x10, the RAM destination address at 0x18, and the file size (of
/// the payload that follows the header) at 0x1C, all little-endian.
fn parse_pseexe(bytes: &[u8]) -> Result<(u32, &[u8])> {
    if bytes.len() < PSEXE_HEADER_LEN {
        bail!("exe file shorter than the PS-EXE header ({PSEXE_HEADER_LEN} bytes)");
    }
    if &bytes[0..8] != PSEXE_MAGIC {
        bail!("exe file missing 'PS-X EXE' magic");
    }
    let dest_addr = u32::from_le_bytes(bytes[0x18..0x1C].try_into().unwrap());
    let file_size = u32::from_le_bytes(bytes[0x1C..0x20].try_into().unwrap()) as usize;
    let payload_end = PSEXE_HEADER_LEN + file_size;
    if payload_end > bytes.len() {
        bail!("exe file truncated: header declares {file_size} bytes of payload");
    }
    Ok((dest_addr, &bytes[PSEXE_HEADER_LEN..payload_end]))
}

fn load_exe(path: &PathBuf, machine: &mut Machine) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading exe file {path:?}"))?;
    let (dest_addr, payload) =
        parse_pseexe(&bytes).with_context(|| format!("parsing exe file {path:?}"))?;
    // RAM is mirrored at 0x00000000-0x1FFFFF; the header's destination
    // address is a KUSEG/KSEG0/KSEG1 alias of that same physical range.
    let offset = (dest_addr & 0x1F_FFFF) as usize;
    log::info!(
        "sideloading {} bytes from {path:?} at {dest_addr:#010x}",
        payload.len()
    );
    machine.sideload_ram(offset, payload);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let bios = load_bios(&args.bios_path)?;
    let mut machine = Machine::new(bios, Box::new(LoggingFrameSink { frames: 0 }));

    if let Some(exe_path) = &args.exe {
        load_exe(exe_path, &mut machine)?;
    }

    log::info!("starting run loop at pc {:#010x}", machine.pc());
    for batch in 0..BATCH_COUNT {
        if let Err(e) = machine.run_batch(BATCH_SIZE) {
            log::error!("host-fatal error in batch {batch}: {e}");
            return Err(anyhow::anyhow!(e));
        }
    }
    log::info!("run loop finished cleanly at pc {:#010x}", machine.pc());

    Ok(())
}
