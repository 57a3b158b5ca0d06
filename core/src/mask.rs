use crate::error::Error;

/// Byte value marking a tile as usable; anything else blocks the tile.
pub const MASK_USABLE: u8 = 1;
/// Channel threshold under which a pixel counts as ink when the worker scans
/// the reference mask image.
pub const MASK_DARK_THRESHOLD: u8 = 16;

/// Durable-cache key for a computed mask. Depends only on grid geometry, so
/// a regenerated image with identical geometry reuses the cached mask until
/// an explicit purge.
pub fn mask_cache_key(cols: u32, rows: u32, tile_size: u32) -> String {
    format!("mask-stable-v2:{cols}x{rows}@{tile_size}")
}

/// Per-tile validity bitmap, row-major, `cols * rows` bytes. Immutable once
/// installed; replaced wholesale when regenerated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileMask {
    cols: u32,
    rows: u32,
    bytes: Vec<u8>,
}

impl TileMask {
    pub fn new(cols: u32, rows: u32, bytes: Vec<u8>) -> Result<Self, Error> {
        let expected = cols as usize * rows as usize;
        if bytes.len() != expected {
            return Err(Error::MalformedInput(format!(
                "mask buffer is {} bytes, expected {expected}",
                bytes.len()
            )));
        }
        Ok(Self { cols, rows, bytes })
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True when the index is inside the grid and its byte equals
    /// [`MASK_USABLE`]. Out-of-range indices are blocked, not errors.
    pub fn usable(&self, ix: i32, iy: i32) -> bool {
        if ix < 0 || iy < 0 || ix as u32 >= self.cols || iy as u32 >= self.rows {
            return false;
        }
        self.bytes[iy as usize * self.cols as usize + ix as usize] == MASK_USABLE
    }
}
