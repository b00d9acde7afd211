//! Reference commitment to an unspent transaction output.
use merkle::MerkleItem;
use merlin::Transcript;
use readerwriter::{Decodable, Encodable, ExactSizeEncodable, ReadError, Reader, WriteError, Writer};
use serde::{Deserialize, Serialize};

use crate::errors::UtreexoError;

/// Identifies an output of a transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction id.
    pub txid: [u8; 32],
    /// Index of the output in the transaction.
    pub vout: u32,
}

/// Data committed to a leaf of the accumulator for every unspent output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafData {
    /// Hash of the block that created the output.
    pub block_hash: [u8; 32],
    /// The output being committed.
    pub prevout: OutPoint,
    /// Block height shifted left by one, with the coinbase flag in the lowest bit.
    pub header_code: u32,
    /// Value of the output.
    pub amount: u64,
    /// Locking script of the output.
    pub script_pubkey: Vec<u8>,
}

impl LeafData {
    /// Creates leaf data for an output created at `height`.
    /// Fails with `InvalidHeight` if the height does not fit in 31 bits.
    pub fn new(
        block_hash: [u8; 32],
        prevout: OutPoint,
        height: u32,
        is_coinbase: bool,
        amount: u64,
        script_pubkey: Vec<u8>,
    ) -> Result<Self, UtreexoError> {
        if height >> 31 != 0 {
            return Err(UtreexoError::InvalidHeight(height));
        }
        Ok(LeafData {
            block_hash,
            prevout,
            header_code: (height << 1) | is_coinbase as u32,
            amount,
            script_pubkey,
        })
    }

    /// Height of the block that created the output.
    pub fn height(&self) -> u32 {
        self.header_code >> 1
    }

    /// Whether the output was created by a coinbase transaction.
    pub fn is_coinbase(&self) -> bool {
        self.header_code & 1 == 1
    }
}

impl Encodable for LeafData {
    fn encode(&self, w: &mut impl Writer) -> Result<(), WriteError> {
        w.write(b"block_hash", &self.block_hash)?;
        w.write(b"txid", &self.prevout.txid)?;
        w.write_u32(b"vout", self.prevout.vout)?;
        w.write_u32(b"header_code", self.header_code)?;
        w.write_u64(b"amount", self.amount)?;
        w.write_u64(b"script_len", self.script_pubkey.len() as u64)?;
        w.write(b"script_pubkey", &self.script_pubkey)
    }
}

impl ExactSizeEncodable for LeafData {
    fn encoded_size(&self) -> usize {
        32 + 32 + 4 + 4 + 8 + 8 + self.script_pubkey.len()
    }
}

impl Decodable for LeafData {
    fn decode(reader: &mut impl Reader) -> Result<Self, ReadError> {
        let block_hash = reader.read_u8x32()?;
        let txid = reader.read_u8x32()?;
        let vout = reader.read_u32()?;
        let header_code = reader.read_u32()?;
        let amount = reader.read_u64()?;
        let len = reader.read_count(1)?;
        let script_pubkey = reader.read_vec(len, |r| r.read_u8())?;
        Ok(LeafData {
            block_hash,
            prevout: OutPoint { txid, vout },
            header_code,
            amount,
            script_pubkey,
        })
    }
}

impl MerkleItem for LeafData {
    fn commit(&self, t: &mut Transcript) {
        self.encode(t)
            .expect("Writing to a transcript never fails.");
    }
}
