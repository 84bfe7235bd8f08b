//! Little-endian binary read/write helpers for index persistence.
//!
//! The on-disk format is unpadded little-endian. Every read verifies that
//! enough bytes were available; a short read surfaces as `DataLoss` so a
//! truncated file is never silently accepted.

use std::io::{Read, Write};

use crate::error::{Error, Result};

fn short_read(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::DataLoss("unexpected end of file".to_string())
    } else {
        Error::Io(e)
    }
}

pub(crate) fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

pub(crate) fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_i32<W: Write>(w: &mut W, v: i32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u64<W: Write>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_f64<W: Write>(w: &mut W, v: f64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_bytes<W: Write>(w: &mut W, v: &[u8]) -> Result<()> {
    w.write_all(v)?;
    Ok(())
}

pub(crate) fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(short_read)?;
    Ok(buf[0])
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(short_read)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(short_read)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(short_read)?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_f64<R: Read>(r: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(short_read)?;
    Ok(f64::from_le_bytes(buf))
}

pub(crate) fn read_bytes<R: Read>(r: &mut R, out: &mut [u8]) -> Result<()> {
    r.read_exact(out).map_err(short_read)
}

/// Writes a `u64` length prefix followed by the raw bytes.
pub(crate) fn write_len_prefixed<W: Write>(w: &mut W, v: &[u8]) -> Result<()> {
    write_u64(w, v.len() as u64)?;
    write_bytes(w, v)
}

/// Reads a `u64` length prefix and the following bytes.
///
/// `max_len` bounds the allocation so a corrupt length field cannot request
/// an absurd buffer.
pub(crate) fn read_len_prefixed<R: Read>(r: &mut R, max_len: u64) -> Result<Vec<u8>> {
    let len = read_u64(r)?;
    if len > max_len {
        return Err(Error::DataLoss(format!(
            "length prefix {len} exceeds limit {max_len}"
        )));
    }
    let mut buf = vec![0u8; usize::try_from(len).map_err(|_| {
        Error::DataLoss(format!("length prefix {len} does not fit in memory"))
    })?];
    read_bytes(r, &mut buf)?;
    Ok(buf)
}
