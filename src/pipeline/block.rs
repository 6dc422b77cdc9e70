use crate::codec::RawImage;
use crate::error::{PixshardError, Result};

/// Bytes per pixel (RGBA)
pub const CHANNELS: usize = 4;

/// One rectangular tile of RGBA bytes, no positional metadata
pub type Block = Vec<u8>;

/// Pixel dimensions of a block (edge blocks are clipped)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockShape {
    pub width: u32,
    pub height: u32,
}

impl BlockShape {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }
}

/// Block rectangle inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tile {
    pub fn shape(&self) -> BlockShape {
        BlockShape {
            width: self.width,
            height: self.height,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.shape().byte_len()
    }
}

fn check_block_size(block_size: u32) -> Result<()> {
    if block_size == 0 {
        return Err(PixshardError::InvalidConfiguration(
            "block size must be positive".into(),
        ));
    }
    Ok(())
}

/// Number of block columns and rows covering a `width` x `height` image
pub fn grid_dimensions(width: u32, height: u32, block_size: u32) -> Result<(u32, u32)> {
    check_block_size(block_size)?;
    Ok((width.div_ceil(block_size), height.div_ceil(block_size)))
}

/// Row-major tile rectangles: rows top to bottom, columns left to right
/// The last column/row is clipped to the image edge
pub fn tiles(width: u32, height: u32, block_size: u32) -> Result<Vec<Tile>> {
    let (cols, rows) = grid_dimensions(width, height, block_size)?;
    let mut out = Vec::with_capacity(cols as usize * rows as usize);
    for by in 0..rows {
        let y = by * block_size;
        let tile_height = block_size.min(height - y);
        for bx in 0..cols {
            let x = bx * block_size;
            out.push(Tile {
                x,
                y,
                width: block_size.min(width - x),
                height: tile_height,
            });
        }
    }
    Ok(out)
}

fn read_tile(buffer: &[u8], stride: u32, tile: &Tile) -> Block {
    let row_len = tile.width as usize * CHANNELS;
    let mut block = Vec::with_capacity(tile.byte_len());
    for row in 0..tile.height as usize {
        let start = ((tile.y as usize + row) * stride as usize + tile.x as usize) * CHANNELS;
        block.extend_from_slice(&buffer[start..start + row_len]);
    }
    block
}

fn write_tile(buffer: &mut [u8], stride: u32, tile: &Tile, block: &[u8]) {
    let row_len = tile.width as usize * CHANNELS;
    for (row, src) in block.chunks_exact(row_len).enumerate() {
        let start = ((tile.y as usize + row) * stride as usize + tile.x as usize) * CHANNELS;
        buffer[start..start + row_len].copy_from_slice(src);
    }
}

/// Split a raw RGBA buffer into row-major blocks
pub fn split(buffer: &[u8], width: u32, height: u32, block_size: u32) -> Result<Vec<Block>> {
    let tiles = tiles(width, height, block_size)?;
    let expected = RawImage::byte_len(width, height);
    if buffer.len() != expected {
        return Err(PixshardError::BufferSizeMismatch {
            expected,
            actual: buffer.len(),
        });
    }
    Ok(tiles
        .iter()
        .map(|tile| read_tile(buffer, width, tile))
        .collect())
}

/// Inverse of [`split`]
///
/// Tiles with no corresponding block (short input) are left zeroed.
pub fn reassemble(blocks: &[Block], width: u32, height: u32, block_size: u32) -> Result<Vec<u8>> {
    let tiles = tiles(width, height, block_size)?;
    let mut buffer = vec![0u8; RawImage::byte_len(width, height)];
    for (index, (tile, block)) in tiles.iter().zip(blocks).enumerate() {
        if block.len() != tile.byte_len() {
            return Err(PixshardError::LayoutMismatch(format!(
                "block {} has {} bytes, tile needs {}",
                index,
                block.len(),
                tile.byte_len()
            )));
        }
        write_tile(&mut buffer, width, tile, block);
    }
    Ok(buffer)
}

/// Columns and rows of the near-square cell grid holding `count` blocks
/// Never smaller than 1x1 so an empty fragment still has a canvas
pub fn canvas_grid(count: usize) -> (usize, usize) {
    if count == 0 {
        return (1, 1);
    }
    let mut cols = (count as f64).sqrt().ceil() as usize;
    while cols * cols < count {
        cols += 1;
    }
    while cols > 1 && (cols - 1) * (cols - 1) >= count {
        cols -= 1;
    }
    (cols, count.div_ceil(cols))
}

fn cell_tile(index: usize, cols: usize, block_size: u32, shape: BlockShape) -> Tile {
    Tile {
        x: (index % cols) as u32 * block_size,
        y: (index / cols) as u32 * block_size,
        width: shape.width,
        height: shape.height,
    }
}

/// Lay a run of blocks into a fragment canvas of `block_size` cells
/// Each block sits in the top-left corner of its cell with its own shape
pub fn pack(blocks: &[Block], shapes: &[BlockShape], block_size: u32) -> Result<RawImage> {
    check_block_size(block_size)?;
    if blocks.len() != shapes.len() {
        return Err(PixshardError::LayoutMismatch(format!(
            "{} blocks but {} shapes",
            blocks.len(),
            shapes.len()
        )));
    }

    let (cols, rows) = canvas_grid(blocks.len());
    let width = u32::try_from(cols)
        .ok()
        .and_then(|c| c.checked_mul(block_size))
        .ok_or_else(|| PixshardError::InvalidConfiguration("fragment too wide".into()))?;
    let height = u32::try_from(rows)
        .ok()
        .and_then(|r| r.checked_mul(block_size))
        .ok_or_else(|| PixshardError::InvalidConfiguration("fragment too tall".into()))?;

    let mut canvas = RawImage::blank(width, height);
    for (index, (block, shape)) in blocks.iter().zip(shapes).enumerate() {
        let fits = (1..=block_size).contains(&shape.width)
            && (1..=block_size).contains(&shape.height)
            && block.len() == shape.byte_len();
        if !fits {
            return Err(PixshardError::LayoutMismatch(format!(
                "block {} does not fit a {}px cell",
                index, block_size
            )));
        }
        let tile = cell_tile(index, cols, block_size, *shape);
        write_tile(&mut canvas.data, width, &tile, block);
    }
    Ok(canvas)
}

/// Read `shapes.len()` blocks back out of a fragment canvas made by [`pack`]
pub fn unpack(canvas: &RawImage, shapes: &[BlockShape], block_size: u32) -> Result<Vec<Block>> {
    check_block_size(block_size)?;
    let (cols, _) = canvas_grid(shapes.len());
    shapes
        .iter()
        .enumerate()
        .map(|(index, shape)| {
            let tile = cell_tile(index, cols, block_size, *shape);
            let fits = u64::from(tile.x) + u64::from(tile.width) <= u64::from(canvas.width)
                && u64::from(tile.y) + u64::from(tile.height) <= u64::from(canvas.height);
            if !fits {
                return Err(PixshardError::LayoutMismatch(format!(
                    "{}x{} fragment cannot hold block {} of {}",
                    canvas.width,
                    canvas.height,
                    index + 1,
                    shapes.len()
                )));
            }
            Ok(read_tile(&canvas.data, canvas.width, &tile))
        })
        .collect()
}
