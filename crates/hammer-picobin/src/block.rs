//! Block walking and item rewriting
//!
//! A block is a header word, a run of items closed by a LAST item, a link
//! word relative to the block start and a footer word:
//!
//! | Word            | Content                                      |
//! |-----------------|----------------------------------------------|
//! | header          | `0xffffded3`                                 |
//! | item header     | `type:u8 size:u8 data:u16`, sizes in words   |
//! | item body       | `size - 1` words                             |
//! | LAST header     | total size of the preceding items            |
//! | link            | offset of the next block from this one       |
//! | footer          | `0xab123579`                                 |
//!
//! Item types with bit 7 set in the first byte carry a two-byte size whose
//! high byte is borrowed from the data field.

use sha2::{Digest, Sha256};

use crate::error::{PicobinError, Result};

pub const HEADER: u32 = 0xffff_ded3;
pub const FOOTER: u32 = 0xab12_3579;

pub const ITEM_IMAGE_TYPE: u8 = 0x42;
pub const ITEM_LOAD_MAP: u8 = 0x06;
pub const ITEM_HASH_DEF: u8 = 0x47;
pub const ITEM_SIGNATURE: u8 = 0x09;
pub const ITEM_HASH_VALUE: u8 = 0x4b;
pub const ITEM_LAST: u8 = 0x7f;

/// Flag marking a two-byte item size.
pub const ITEM_SIZE_2BYTE: u8 = 0x80;

pub const HASH_SHA256: u8 = 0x01;
pub const SIG_SECP256K1: u8 = 0x01;

/// Public key and signature lengths of a secp256k1 SIGNATURE item.
pub const PUBKEY_LEN: usize = 64;
pub const SIGNATURE_LEN: usize = 64;

/// SIGNATURE item size in words, header included.
const SIGNATURE_ITEM_WORDS: u16 = 1 + ((PUBKEY_LEN + SIGNATURE_LEN) / 4) as u16;

/// Bytes searched for the first block header.
const SCAN_LEN: usize = 4096;

const MAX_LOOP_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHeader {
    pub kind: u8,
    /// Size in words, header included
    pub size: u16,
    pub data: u16,
}

impl ItemHeader {
    pub fn from_word(w: u32) -> Self {
        let [b0, b1, b2, b3] = w.to_le_bytes();
        let mut size = u16::from(b1);
        if b0 & ITEM_SIZE_2BYTE != 0 {
            size |= u16::from(b2) << 8;
        }
        Self {
            kind: b0 & 0x7f,
            size,
            data: u16::from_le_bytes([b2, b3]),
        }
    }
}

/// A parsed firmware image.
///
/// Item offsets refer to the last block of the walk, i.e. the block with
/// the highest address in a well-formed image.
#[derive(Debug, Clone)]
pub struct Image<'a> {
    data: &'a [u8],
    block_start: usize,
    load_map: Option<usize>,
    hash_def: Option<usize>,
    hash_value: Option<usize>,
    signature: Option<usize>,
}

fn word(data: &[u8], off: usize) -> Result<u32> {
    let b = bytes(data, off, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn item(data: &[u8], off: usize) -> Result<ItemHeader> {
    word(data, off).map(ItemHeader::from_word)
}

fn bytes(data: &[u8], off: usize, len: usize) -> Result<&[u8]> {
    off.checked_add(len)
        .and_then(|end| data.get(off..end))
        .ok_or(PicobinError::Truncated(off))
}

/// Link word and footer check for the words at `off`.
fn footer(data: &[u8], off: usize) -> Result<u32> {
    let link = word(data, off)?;
    if word(data, off + 4)? != FOOTER {
        return Err(PicobinError::MissingFooter);
    }
    Ok(link)
}

impl<'a> Image<'a> {
    /// Walk the block loop of `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let first = (0..SCAN_LEN)
            .step_by(4)
            .find(|&off| word(data, off).ok() == Some(HEADER))
            .ok_or(PicobinError::MissingHeader)?;

        let mut img = Image {
            data,
            block_start: first,
            load_map: None,
            hash_def: None,
            hash_value: None,
            signature: None,
        };
        let mut block = first as u32;
        let mut nblocks = 0;
        loop {
            let mut idx = block as usize;
            if word(data, idx)? != HEADER {
                return Err(PicobinError::MissingHeader);
            }
            img.block_start = idx;
            idx += 4;
            let mut total = 0usize;
            loop {
                let h = item(data, idx)?;
                if h.size == 0 {
                    return Err(PicobinError::ZeroSizedItem);
                }
                if h.kind == ITEM_LAST {
                    if total != usize::from(h.size) {
                        return Err(PicobinError::MismatchedSize);
                    }
                    break;
                }
                total += usize::from(h.size);
                match h.kind {
                    ITEM_LOAD_MAP => {
                        img.load_map = Some(idx);
                        img.hash_def = None;
                        img.hash_value = None;
                        img.signature = None;
                    }
                    ITEM_HASH_DEF => {
                        img.hash_def = Some(idx);
                        img.hash_value = None;
                        img.signature = None;
                    }
                    ITEM_HASH_VALUE => img.hash_value = Some(idx),
                    ITEM_SIGNATURE => {
                        if h.size != SIGNATURE_ITEM_WORDS {
                            return Err(PicobinError::InvalidSignatureSize);
                        }
                        img.signature = Some(idx + 4);
                    }
                    _ => {}
                }
                idx += usize::from(h.size) * 4;
            }
            let link = footer(data, idx + 4)?;
            tracing::debug!("Block at {:#x}, link {:#x}", block, link);
            nblocks += 1;
            if nblocks == MAX_LOOP_LEN {
                return Err(PicobinError::LoopTooLong);
            }
            block = block.wrapping_add(link);
            if block as usize == first {
                break;
            }
        }
        Ok(img)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Offset of the SIGNATURE item body, if any.
    pub fn signature_offset(&self) -> Option<usize> {
        self.signature
    }

    /// The public key and signature of the SIGNATURE item.
    pub fn signature(&self) -> Result<(&'a [u8], &'a [u8])> {
        let off = self
            .signature
            .ok_or(PicobinError::MissingItem("SIGNATURE"))?;
        let body = bytes(self.data, off, PUBKEY_LEN + SIGNATURE_LEN)?;
        Ok(body.split_at(PUBKEY_LEN))
    }

    /// The digest stored in the HASH_VALUE item.
    pub fn hash(&self) -> Result<&'a [u8]> {
        let off = self
            .hash_value
            .ok_or(PicobinError::MissingItem("HASH_VALUE"))?;
        let h = item(self.data, off)?;
        bytes(self.data, off + 4, usize::from(h.size) * 4 - 4)
    }

    /// SHA-256 over the load map regions and the hashed prefix of the block,
    /// the digest a signature covers. `image_addr` is the flash address the
    /// image is loaded at.
    pub fn hash_data(&self, image_addr: u32) -> Result<[u8; 32]> {
        let data = self.data;
        let hash_def = self.hash_def.ok_or(PicobinError::MissingItem("HASH_DEF"))?;
        let h = item(data, hash_def)?;
        let algo = (h.data >> 8) as u8;
        if algo != HASH_SHA256 {
            return Err(PicobinError::UnknownHashAlgorithm(algo));
        }
        let block_hashed = 4 * (word(data, hash_def + 4)? & 0xffff) as usize;

        let load_map = self.load_map.ok_or(PicobinError::MissingItem("LOAD_MAP"))?;
        let h = item(data, load_map)?;
        let nentries = usize::from(h.size.saturating_sub(1) / 3);
        let absolute = h.data & 0x8000 != 0;

        let mut hasher = Sha256::new();
        let entries = load_map + 4;
        for i in 0..nentries {
            let entry = entries + i * 12;
            let storage_start = word(data, entry)?;
            let size = word(data, entry + 8)?;
            if storage_start == 0 {
                // Zero-filled regions hash their size.
                hasher.update(bytes(data, entry + 8, 4)?);
                continue;
            }
            let (start, size) = if absolute {
                let size = size
                    .checked_sub(storage_start)
                    .ok_or(PicobinError::InvalidLoadMap)?;
                let start = storage_start
                    .checked_sub(image_addr)
                    .ok_or(PicobinError::InvalidLoadMap)?;
                (start, size)
            } else {
                (storage_start.wrapping_add(load_map as u32), size)
            };
            tracing::trace!("Hashing {:#x} bytes at {:#x}", size, start);
            hasher.update(bytes(data, start as usize, size as usize)?);
        }
        hasher.update(bytes(data, self.block_start, block_hashed)?);
        Ok(hasher.finalize().into())
    }

    /// Copy of the image carrying `pubkey` and `signature`.
    ///
    /// An existing SIGNATURE item is overwritten in place. Otherwise the
    /// HASH_VALUE item, which must be the last item of the block, is
    /// replaced by a SIGNATURE item and the block is closed again; anything
    /// after the block is dropped.
    pub fn sign(&self, pubkey: &[u8; PUBKEY_LEN], signature: &[u8; SIGNATURE_LEN]) -> Result<Vec<u8>> {
        match (self.hash_value, self.signature) {
            (Some(off), _) => self.sign_hashed(off, pubkey, signature),
            (None, Some(off)) => {
                self.signature()?;
                let mut out = self.data.to_vec();
                out[off..off + PUBKEY_LEN].copy_from_slice(pubkey);
                out[off + PUBKEY_LEN..off + PUBKEY_LEN + SIGNATURE_LEN].copy_from_slice(signature);
                Ok(out)
            }
            (None, None) => Err(PicobinError::MissingItem("SIGNATURE or HASH_VALUE")),
        }
    }

    fn sign_hashed(
        &self,
        off: usize,
        pubkey: &[u8; PUBKEY_LEN],
        signature: &[u8; SIGNATURE_LEN],
    ) -> Result<Vec<u8>> {
        let hash_item = 4 + self.hash()?.len();
        let last_off = off + hash_item;
        let last = item(self.data, last_off)?;
        if last.kind != ITEM_LAST {
            return Err(PicobinError::HashValueNotLast);
        }
        let link = footer(self.data, last_off + 4)?;

        let sig_item = usize::from(SIGNATURE_ITEM_WORDS) * 4;
        let grown = ((sig_item - hash_item) / 4) as u32;
        let sig_header = u32::from(ITEM_SIGNATURE)
            | u32::from(SIGNATURE_ITEM_WORDS) << 8
            | u32::from(SIG_SECP256K1) << 24;
        let last_header =
            u32::from(ITEM_SIZE_2BYTE | ITEM_LAST) | (u32::from(last.size) + grown) << 8;

        let mut out = Vec::with_capacity(off + sig_item + 12);
        out.extend_from_slice(&self.data[..off]);
        out.extend_from_slice(&sig_header.to_le_bytes());
        out.extend_from_slice(pubkey);
        out.extend_from_slice(signature);
        out.extend_from_slice(&last_header.to_le_bytes());
        out.extend_from_slice(&link.to_le_bytes());
        out.extend_from_slice(&FOOTER.to_le_bytes());
        tracing::debug!("Replaced HASH_VALUE at {:#x} with SIGNATURE", off);
        Ok(out)
    }
}
