//! Executable architecture probing.
//!
//! Classifies a file as a 32-bit or 64-bit PE image by walking the two-stage
//! header chain (DOS stub header, then the NT headers it points at) over a
//! bounded prefix of the file. The walk is a pure function over a byte slice;
//! every field access is preceded by a bounds or signature check, so
//! truncated, corrupted, or non-executable input degrades to
//! [`FileArchitecture::Invalid`] instead of faulting.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use tracing::debug;

/// `MZ` magic of the DOS stub header.
pub const DOS_SIGNATURE: u16 = 0x5A4D;
/// `PE\0\0` signature of the NT headers.
pub const PE_SIGNATURE: u32 = 0x0000_4550;
/// Machine field value for 32-bit x86.
pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014C;
/// Machine field value for 64-bit x86.
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;

/// Maximum prefix read when probing. Only the header region is needed, so
/// large binaries are never read in full.
pub const MAX_PROBE_SIZE: usize = 4096;

// Offset of e_lfanew (the NT headers offset) within the DOS header.
const DOS_LFANEW_OFFSET: usize = 60;

/// Classification produced by the probe. Produced fresh per call, never
/// cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileArchitecture {
    /// The path could not be opened or read
    NotFound,
    /// Opened, but not a recognized 32/64-bit PE image
    Invalid,
    /// 32-bit x86 image
    Bits32,
    /// 64-bit x86 image
    Bits64,
}

impl fmt::Display for FileArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Invalid => write!(f, "invalid"),
            Self::Bits32 => write!(f, "32-bit"),
            Self::Bits64 => write!(f, "64-bit"),
        }
    }
}

/// Bounds-checked little-endian reads over a byte slice.
trait ReadExt {
    fn read_u16_le_at(&self, offset: usize) -> Option<u16>;
    fn read_u32_le_at(&self, offset: usize) -> Option<u32>;
}

impl ReadExt for [u8] {
    #[inline(always)]
    fn read_u16_le_at(&self, offset: usize) -> Option<u16> {
        self.get(offset..offset.checked_add(2)?)
            .and_then(|b| b.try_into().ok())
            .map(u16::from_le_bytes)
    }

    #[inline(always)]
    fn read_u32_le_at(&self, offset: usize) -> Option<u32> {
        self.get(offset..offset.checked_add(4)?)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
    }
}

/// Classifies an in-memory header prefix.
///
/// Starts from [`FileArchitecture::Invalid`] and only upgrades: the DOS
/// signature must match, `e_lfanew` must land inside `data`, the NT signature
/// must match, and the machine field must name 32-bit or 64-bit x86. Any
/// recognized-but-unhandled machine type stays `Invalid`.
pub fn classify_image(data: &[u8]) -> FileArchitecture {
    let Some(e_magic) = data.read_u16_le_at(0) else {
        return FileArchitecture::Invalid;
    };
    if e_magic != DOS_SIGNATURE {
        return FileArchitecture::Invalid;
    }

    let Some(e_lfanew) = data.read_u32_le_at(DOS_LFANEW_OFFSET) else {
        return FileArchitecture::Invalid;
    };
    let nt_offset = e_lfanew as usize;

    let Some(signature) = data.read_u32_le_at(nt_offset) else {
        return FileArchitecture::Invalid;
    };
    if signature != PE_SIGNATURE {
        return FileArchitecture::Invalid;
    }

    // Machine is the first field of the file header, right after the
    // signature.
    let Some(machine_offset) = nt_offset.checked_add(4) else {
        return FileArchitecture::Invalid;
    };
    match data.read_u16_le_at(machine_offset) {
        Some(IMAGE_FILE_MACHINE_I386) => FileArchitecture::Bits32,
        Some(IMAGE_FILE_MACHINE_AMD64) => FileArchitecture::Bits64,
        _ => FileArchitecture::Invalid,
    }
}

/// Probes the architecture of the executable at `path`.
///
/// Opens the file read-only, reads at most [`MAX_PROBE_SIZE`] bytes into a
/// stack buffer, and classifies the prefix. A path that cannot be opened or
/// read yields [`FileArchitecture::NotFound`]; malformed content yields
/// [`FileArchitecture::Invalid`]. Never faults on arbitrary input.
pub fn probe_architecture<P: AsRef<Path>>(path: P) -> FileArchitecture {
    let path = path.as_ref();
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!(path = %path.display(), %err, "architecture probe could not open file");
            return FileArchitecture::NotFound;
        }
    };

    let mut buf = [0u8; MAX_PROBE_SIZE];
    let mut filled = 0usize;
    loop {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                if filled == buf.len() {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(path = %path.display(), %err, "architecture probe read failed");
                return FileArchitecture::NotFound;
            }
        }
    }

    classify_image(&buf[..filled])
}
