use tokio::io::{AsyncRead, AsyncReadExt};

/// Upload block size. Files are never held in memory beyond one block.
pub const BLOCK_SIZE: usize = 8 * 1024 * 1024;

/// Reads up to `limit` bytes. A short or empty result means end of input.
pub async fn read_block<R>(reader: &mut R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut block = Vec::with_capacity(limit);
    reader.take(limit as u64).read_to_end(&mut block).await?;
    Ok(block)
}

/// Fixed-width block id; every id in one block list must have the same length.
pub fn block_id(index: usize) -> String {
    format!("{:08}", index)
}
