//! Row encoding and decoding.
//!
//! A row is an ordered list of text fields; the first field is the primary
//! key. Layout:
//! ```text
//! Offset  Size  Description
//! 0       4     Field count (little-endian u32)
//! 4       4     Length of field 0 (little-endian u32)
//! 8       n     Field 0 bytes
//! ...           Repeated for each remaining field
//! ```

use crate::error::{Result, StorageError};

/// A decoded row
pub type Row = Vec<String>;

/// Size of the count and length prefixes
const LEN_SIZE: usize = 4;

/// Encode a list of fields into a row buffer.
pub fn encode_row<S: AsRef<str>>(fields: &[S]) -> Vec<u8> {
    let payload: usize = fields.iter().map(|f| f.as_ref().len()).sum();
    let mut buf = Vec::with_capacity(LEN_SIZE * (fields.len() + 1) + payload);

    buf.extend_from_slice(&(fields.len() as u32).to_le_bytes());
    for field in fields {
        let bytes = field.as_ref().as_bytes();
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
    }

    buf
}

/// Decode a row buffer into its fields.
pub fn decode_row(bytes: &[u8]) -> Result<Row> {
    let mut reader = FieldReader::new(bytes);
    let count = reader.read_len()?;

    // The count is untrusted; every field needs at least its length prefix.
    let mut fields = Vec::with_capacity(count.min(bytes.len() / LEN_SIZE));
    for i in 0..count {
        let raw = reader.read_field(i)?;
        fields.push(to_text(raw, i)?);
    }

    Ok(fields)
}

/// Decode only the primary key (first field) of a row buffer.
pub fn row_key(bytes: &[u8]) -> Result<String> {
    let mut reader = FieldReader::new(bytes);
    if reader.read_len()? == 0 {
        return Err(StorageError::malformed_record("row has no fields"));
    }
    let raw = reader.read_field(0)?;
    to_text(raw, 0)
}

fn to_text(raw: &[u8], index: usize) -> Result<String> {
    String::from_utf8(raw.to_vec()).map_err(|_| {
        StorageError::malformed_record(format!("field {} is not valid UTF-8", index))
    })
}

/// Cursor over a row buffer that bounds-checks every read
struct FieldReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn read_len(&mut self) -> Result<usize> {
        let end = self.offset + LEN_SIZE;
        if end > self.bytes.len() {
            return Err(StorageError::malformed_record(format!(
                "length prefix at offset {} overruns {}-byte buffer",
                self.offset,
                self.bytes.len()
            )));
        }
        let mut len = [0u8; LEN_SIZE];
        len.copy_from_slice(&self.bytes[self.offset..end]);
        self.offset = end;
        Ok(u32::from_le_bytes(len) as usize)
    }

    fn read_field(&mut self, index: usize) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                StorageError::malformed_record(format!(
                    "field {} of {} bytes overruns {}-byte buffer",
                    index,
                    len,
                    self.bytes.len()
                ))
            })?;
        let field = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(field)
    }
}
