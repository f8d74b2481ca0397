use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const OP_RANDOM_WRITE: u8 = 0x0F;
pub const OP_SYNC_RANDOM_WRITE: u8 = 0x10;

const RANDOM_WRITE_FORMAT_VERSION: u8 = 1;
const HEADER_SIZE: usize = 1 + 1 + 8 + 8 + 8 + 4;

/// A random (overwrite) write, as proposed through raft.
///
/// Byte representation (big endian):
///
/// ```text
/// | 0 | 1 | 2 .. 9    | 10 .. 17  | 18 .. 25  | 26 .. 29 | 30 ...             |
/// +---+---+-----------+-----------+-----------+----------+--------------...---+
/// |Vrs|Op | Extent ID | Offset    | Size      | CRC      | Data (Size bytes)  |
/// +---+---+-----------+-----------+-----------+----------+--------------...---+
/// ```
///
/// * `Vrs` - version of the serialized payload
/// * `Op` - opcode, one of `OP_RANDOM_WRITE` or `OP_SYNC_RANDOM_WRITE`
/// * `CRC` - CRC32 of `Data`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RandomWriteOp {
    pub opcode: u8,
    pub extent_id: u64,
    pub offset: u64,
    pub size: u64,
    pub crc: u32,
    pub data: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum WriteOpDecodeError {
    #[error("payload of {0} bytes is shorter than the header")]
    Truncated(usize),
    #[error("unknown payload version {0}")]
    UnknownVersion(u8),
    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),
    #[error("header says {expected} data bytes, payload has {actual}")]
    SizeMismatch { expected: u64, actual: usize },
}

impl RandomWriteOp {
    pub fn new(opcode: u8, extent_id: u64, offset: u64, data: Bytes) -> Self {
        RandomWriteOp {
            opcode,
            extent_id,
            offset,
            size: data.len() as u64,
            crc: crc32fast::hash(&data),
            data,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.data.len());
        buf.put_u8(RANDOM_WRITE_FORMAT_VERSION);
        buf.put_u8(self.opcode);
        buf.put_u64(self.extent_id);
        buf.put_u64(self.offset);
        buf.put_u64(self.size);
        buf.put_u32(self.crc);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WriteOpDecodeError> {
        if payload.len() < HEADER_SIZE {
            return Err(WriteOpDecodeError::Truncated(payload.len()));
        }

        let mut buf = payload;
        let version = buf.get_u8();
        if version != RANDOM_WRITE_FORMAT_VERSION {
            return Err(WriteOpDecodeError::UnknownVersion(version));
        }
        let opcode = buf.get_u8();
        if opcode != OP_RANDOM_WRITE && opcode != OP_SYNC_RANDOM_WRITE {
            return Err(WriteOpDecodeError::UnknownOpcode(opcode));
        }
        let extent_id = buf.get_u64();
        let offset = buf.get_u64();
        let size = buf.get_u64();
        let crc = buf.get_u32();
        if buf.len() as u64 != size {
            return Err(WriteOpDecodeError::SizeMismatch {
                expected: size,
                actual: buf.len(),
            });
        }

        Ok(RandomWriteOp {
            opcode,
            extent_id,
            offset,
            size,
            crc,
            data: Bytes::copy_from_slice(buf),
        })
    }

    pub fn is_crc_valid(&self) -> bool {
        crc32fast::hash(&self.data) == self.crc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_encoded_op() {
        let op = RandomWriteOp::new(OP_RANDOM_WRITE, 1025, 4096, Bytes::from_static(b"abc"));
        let encoded = op.encode();
        assert_eq!(encoded.len(), HEADER_SIZE + 3);

        let decoded = RandomWriteOp::decode(&encoded).unwrap();
        assert_eq!(decoded, op);
        assert!(decoded.is_crc_valid());
    }

    #[test]
    fn decode_errors() {
        let encoded = RandomWriteOp::new(OP_SYNC_RANDOM_WRITE, 1025, 0, Bytes::from_static(b"abcd")).encode();

        match RandomWriteOp::decode(&encoded[..10]) {
            Err(WriteOpDecodeError::Truncated(10)) => {}
            other => panic!("Unexpected: {:?}", other),
        }

        match RandomWriteOp::decode(&encoded[..encoded.len() - 1]) {
            Err(WriteOpDecodeError::SizeMismatch { expected: 4, actual: 3 }) => {}
            other => panic!("Unexpected: {:?}", other),
        }

        let mut bad_version = encoded.to_vec();
        bad_version[0] = 9;
        match RandomWriteOp::decode(&bad_version) {
            Err(WriteOpDecodeError::UnknownVersion(9)) => {}
            other => panic!("Unexpected: {:?}", other),
        }

        let mut bad_opcode = encoded.to_vec();
        bad_opcode[1] = 0x01;
        match RandomWriteOp::decode(&bad_opcode) {
            Err(WriteOpDecodeError::UnknownOpcode(0x01)) => {}
            other => panic!("Unexpected: {:?}", other),
        }
    }

    #[test]
    fn crc_mismatch_detected() {
        let mut op = RandomWriteOp::new(OP_RANDOM_WRITE, 1025, 0, Bytes::from_static(b"abcd"));
        op.crc ^= 1;
        assert!(!op.is_crc_valid());
    }
}
