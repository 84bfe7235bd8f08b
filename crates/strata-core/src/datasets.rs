//! Raw vector file reader and writer.
//!
//! The format is the unit shared with bulk-ingest and ground-truth tooling:
//! a two-word header `{ u32 nvec; u32 dim }` followed by
//! `nvec * dim * sizeof(element)` little-endian element bytes. The same
//! writer produces the raw-vector section inside an index file.

use std::io::{Read, Write};
use std::marker::PhantomData;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::io;

/// Streaming writer for the raw vector file format.
///
/// The number of vectors is declared up front; [`VectorFileWriter::finish`]
/// verifies that exactly that many were written.
pub struct VectorFileWriter<'w, W: Write, E: Element> {
    out: &'w mut W,
    nvec: u32,
    dim: u32,
    written: u32,
    _marker: PhantomData<E>,
}

impl<'w, W: Write, E: Element> VectorFileWriter<'w, W, E> {
    /// Writes the header and returns a writer expecting `nvec` vectors of
    /// `dim` elements each.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero dimension, or an IO error from
    /// the underlying writer.
    pub fn create(out: &'w mut W, nvec: u32, dim: u32) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidArgument("vector file dimension is zero".into()));
        }
        io::write_u32(out, nvec)?;
        io::write_u32(out, dim)?;
        Ok(Self {
            out,
            nvec,
            dim,
            written: 0,
            _marker: PhantomData,
        })
    }

    /// Appends one vector.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a dimension mismatch, `OutOfRange` when
    /// more vectors are written than the header declared.
    pub fn write_vector(&mut self, v: &[E]) -> Result<()> {
        if v.len() != self.dim as usize {
            return Err(Error::InvalidArgument(format!(
                "vector has {} elements, file dimension is {}",
                v.len(),
                self.dim
            )));
        }
        if self.written >= self.nvec {
            return Err(Error::OutOfRange(format!(
                "vector file already holds the declared {} vectors",
                self.nvec
            )));
        }
        E::write_slice(self.out, v)?;
        self.written += 1;
        Ok(())
    }

    /// Number of vectors written so far.
    #[must_use]
    pub fn written(&self) -> u32 {
        self.written
    }

    /// Verifies that the declared vector count was written.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the count does not match the header.
    pub fn finish(self) -> Result<()> {
        if self.written != self.nvec {
            return Err(Error::Internal(format!(
                "vector file header declared {} vectors, wrote {}",
                self.nvec, self.written
            )));
        }
        Ok(())
    }
}

/// Streaming reader for the raw vector file format.
#[derive(Debug)]
pub struct VectorFileReader<'r, R: Read, E: Element> {
    input: &'r mut R,
    nvec: u32,
    dim: u32,
    read: u32,
    _marker: PhantomData<E>,
}

impl<'r, R: Read, E: Element> VectorFileReader<'r, R, E> {
    /// Reads the header and returns a reader positioned at the first vector.
    ///
    /// # Errors
    ///
    /// Returns `DataLoss` on a short header read.
    pub fn open(input: &'r mut R) -> Result<Self> {
        let nvec = io::read_u32(input)?;
        let dim = io::read_u32(input)?;
        if dim == 0 {
            return Err(Error::DataLoss("vector file header has zero dimension".into()));
        }
        Ok(Self {
            input,
            nvec,
            dim,
            read: 0,
            _marker: PhantomData,
        })
    }

    /// Declared vector count.
    #[must_use]
    pub fn nvec(&self) -> u32 {
        self.nvec
    }

    /// Declared dimension.
    #[must_use]
    pub fn dim(&self) -> u32 {
        self.dim
    }

    /// Number of vectors read so far.
    #[must_use]
    pub fn read_count(&self) -> u32 {
        self.read
    }

    /// Reads the next vector into `out`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a buffer size mismatch, `OutOfRange`
    /// past the declared count, `DataLoss` on a short read.
    pub fn read_vector(&mut self, out: &mut [E]) -> Result<()> {
        if out.len() != self.dim as usize {
            return Err(Error::InvalidArgument(format!(
                "buffer has {} elements, file dimension is {}",
                out.len(),
                self.dim
            )));
        }
        if self.read >= self.nvec {
            return Err(Error::OutOfRange(format!(
                "vector file holds only {} vectors",
                self.nvec
            )));
        }
        E::read_slice(self.input, out).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::DataLoss("vector file truncated mid-vector".into())
            } else {
                Error::Io(e)
            }
        })?;
        self.read += 1;
        Ok(())
    }
}
