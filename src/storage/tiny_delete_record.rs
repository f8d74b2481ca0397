use bytes::{Buf, BufMut, BytesMut};

/// Encoded size of a single record. The length of a tiny delete record log is always a multiple
/// of this, which lets the log length double as a sync cursor.
pub const TINY_DELETE_RECORD_SIZE: u64 = 24;

/// One punched hole in a tiny extent.
///
/// Byte representation (big endian):
///
/// ```text
/// | 0  ..  7        | 8  ..  15       | 16  ..  23      |
/// +-----------------+-----------------+-----------------+
/// |  Extent ID (8)  |   Offset (8)    |    Size (8)     |
/// +-----------------+-----------------+-----------------+
/// ```
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct TinyDeleteRecord {
    pub extent_id: u64,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordFormatError {
    #[error("record batch of {0} bytes is not a multiple of {}", TINY_DELETE_RECORD_SIZE)]
    UnalignedBatch(usize),
}

impl TinyDeleteRecord {
    pub fn new(extent_id: u64, offset: u64, size: u64) -> Self {
        TinyDeleteRecord { extent_id, offset, size }
    }

    pub fn encode_to(&self, buf: &mut BytesMut) {
        buf.reserve(TINY_DELETE_RECORD_SIZE as usize);
        buf.put_u64(self.extent_id);
        buf.put_u64(self.offset);
        buf.put_u64(self.size);
    }

    /// Decode a whole batch. The batch must hold an exact number of records.
    pub fn decode_batch(mut data: &[u8]) -> Result<Vec<TinyDeleteRecord>, RecordFormatError> {
        if data.len() % TINY_DELETE_RECORD_SIZE as usize != 0 {
            return Err(RecordFormatError::UnalignedBatch(data.len()));
        }

        let mut records = Vec::with_capacity(data.len() / TINY_DELETE_RECORD_SIZE as usize);
        while data.has_remaining() {
            let extent_id = data.get_u64();
            let offset = data.get_u64();
            let size = data.get_u64();
            records.push(TinyDeleteRecord { extent_id, offset, size });
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_batch_of_two() {
        let mut buf = BytesMut::new();
        TinyDeleteRecord::new(3, 4096, 512).encode_to(&mut buf);
        TinyDeleteRecord::new(64, 0, 8192).encode_to(&mut buf);
        assert_eq!(buf.len(), 2 * TINY_DELETE_RECORD_SIZE as usize);

        let records = TinyDeleteRecord::decode_batch(&buf).unwrap();
        assert_eq!(
            records,
            vec![TinyDeleteRecord::new(3, 4096, 512), TinyDeleteRecord::new(64, 0, 8192)]
        );
    }

    #[test]
    fn decode_batch_rejects_partial_record() {
        let mut buf = BytesMut::new();
        TinyDeleteRecord::new(3, 4096, 512).encode_to(&mut buf);
        buf.put_u8(0);

        match TinyDeleteRecord::decode_batch(&buf) {
            Err(RecordFormatError::UnalignedBatch(25)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn decode_empty_batch() {
        assert!(TinyDeleteRecord::decode_batch(&[]).unwrap().is_empty());
    }
}
