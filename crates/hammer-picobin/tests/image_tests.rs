//! Signing and hashing synthesized firmware images

use hammer_picobin::block::*;
use hammer_picobin::{Image, PicobinError, FLASH_BASE};
use proptest::prelude::*;
use sha2::{Digest, Sha256};

const BLOCK: usize = 0x100;
const CODE: std::ops::Range<usize> = 0x10..0x100;
/// Words of the block covered by the image hash: header, IMAGE_TYPE and
/// LOAD_MAP.
const HASHED_WORDS: usize = 1 + 1 + 7;

#[derive(Clone, Copy)]
enum Tail {
    Hash,
    Signature,
}

fn push(out: &mut Vec<u8>, w: u32) {
    out.extend_from_slice(&w.to_le_bytes());
}

/// A code region followed by one block with a two-entry load map.
fn image(absolute: bool, tail: Tail) -> Vec<u8> {
    let mut out: Vec<u8> = (0..BLOCK).map(|i| i as u8).collect();
    push(&mut out, HEADER);
    out.extend_from_slice(&[ITEM_IMAGE_TYPE, 1, 0x21, 0x10]);

    let load_map = out.len() as u32;
    out.extend_from_slice(&[ITEM_LOAD_MAP, 7, 2, if absolute { 0x80 } else { 0 }]);
    if absolute {
        push(&mut out, FLASH_BASE + CODE.start as u32);
        push(&mut out, 0x2000_0000);
        push(&mut out, FLASH_BASE + CODE.end as u32);
    } else {
        push(&mut out, (CODE.start as u32).wrapping_sub(load_map));
        push(&mut out, 0x2000_0000);
        push(&mut out, (CODE.end - CODE.start) as u32);
    }
    // Zero-filled region.
    push(&mut out, 0);
    push(&mut out, 0x2000_1000);
    push(&mut out, 0x400);

    out.extend_from_slice(&[ITEM_HASH_DEF, 2, 0, HASH_SHA256]);
    push(&mut out, HASHED_WORDS as u32);

    let tail_words = match tail {
        Tail::Hash => {
            out.extend_from_slice(&[ITEM_HASH_VALUE, 9, 0, 0]);
            out.extend_from_slice(&[0x11; 32]);
            9
        }
        Tail::Signature => {
            out.extend_from_slice(&[ITEM_SIGNATURE, 33, 0, SIG_SECP256K1]);
            out.extend_from_slice(&[0x22; 64]);
            out.extend_from_slice(&[0x33; 64]);
            33
        }
    };
    out.extend_from_slice(&[ITEM_LAST, 1 + 7 + 2 + tail_words, 0, 0]);
    push(&mut out, 0);
    push(&mut out, FOOTER);
    out
}

fn expected_hash(img: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(&img[CODE]);
    h.update(0x400u32.to_le_bytes());
    h.update(&img[BLOCK..BLOCK + HASHED_WORDS * 4]);
    h.finalize().into()
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn reads_hash_value() {
    let data = image(false, Tail::Hash);
    let img = Image::parse(&data).unwrap();
    assert_eq!(img.hash().unwrap(), &[0x11; 32][..]);
    assert!(matches!(
        img.signature(),
        Err(PicobinError::MissingItem("SIGNATURE"))
    ));
}

#[test]
fn reads_signature() {
    let data = image(false, Tail::Signature);
    let img = Image::parse(&data).unwrap();
    let (key, sig) = img.signature().unwrap();
    assert_eq!(key, &[0x22; 64][..]);
    assert_eq!(sig, &[0x33; 64][..]);
}

#[test]
fn rejects_wrong_signature_size() {
    let mut data = image(false, Tail::Signature);
    let off = BLOCK + 4 + 4 + 7 * 4 + 2 * 4;
    assert_eq!(data[off], ITEM_SIGNATURE);
    data[off + 1] = 32;
    assert_eq!(
        Image::parse(&data).unwrap_err(),
        PicobinError::InvalidSignatureSize
    );
}

#[test]
fn walks_to_last_block() {
    // The image block links forward to a trailing block, which links back.
    let mut data = image(false, Tail::Hash);
    let second = data.len();
    let mut first = Vec::new();
    push(&mut first, HEADER);
    first.extend_from_slice(&[ITEM_IMAGE_TYPE, 1, 0, 0]);
    first.extend_from_slice(&[ITEM_LAST, 1, 0, 0]);

    let back = (BLOCK as u32).wrapping_sub(second as u32);
    data.extend_from_slice(&first);
    push(&mut data, back);
    push(&mut data, FOOTER);
    let link_off = second - 8;
    data[link_off..link_off + 4].copy_from_slice(&((second - BLOCK) as u32).to_le_bytes());

    let img = Image::parse(&data).unwrap();
    // The trailing block carries no hash items.
    assert_eq!(img.hash().unwrap(), &[0x11; 32][..]);
}

// ============================================================================
// Hash of data
// ============================================================================

#[test]
fn hashes_relative_load_map() {
    let data = image(false, Tail::Hash);
    let img = Image::parse(&data).unwrap();
    assert_eq!(img.hash_data(FLASH_BASE).unwrap(), expected_hash(&data));
}

#[test]
fn hashes_absolute_load_map() {
    let data = image(true, Tail::Signature);
    let img = Image::parse(&data).unwrap();
    assert_eq!(img.hash_data(FLASH_BASE).unwrap(), expected_hash(&data));
}

#[test]
fn absolute_entries_below_base_fail() {
    let data = image(true, Tail::Hash);
    let img = Image::parse(&data).unwrap();
    assert_eq!(
        img.hash_data(FLASH_BASE + 0x1000).unwrap_err(),
        PicobinError::InvalidLoadMap
    );
}

#[test]
fn unknown_hash_algorithm() {
    let mut data = image(false, Tail::Hash);
    let off = BLOCK + 4 + 4 + 7 * 4;
    assert_eq!(data[off], ITEM_HASH_DEF);
    data[off + 3] = 0x02;
    let img = Image::parse(&data).unwrap();
    assert_eq!(
        img.hash_data(FLASH_BASE).unwrap_err(),
        PicobinError::UnknownHashAlgorithm(0x02)
    );
}

// ============================================================================
// Signing
// ============================================================================

#[test]
fn resigns_in_place() {
    let key = [0xde; 64];
    let sig = [0xbe; 64];
    let data = image(false, Tail::Signature);
    let signed = Image::parse(&data).unwrap().sign(&key, &sig).unwrap();
    assert_eq!(signed.len(), data.len());

    let img = Image::parse(&signed).unwrap();
    assert_eq!(img.signature().unwrap(), (&key[..], &sig[..]));
    assert_eq!(img.hash_data(FLASH_BASE).unwrap(), expected_hash(&data));
}

#[test]
fn resigns_signed_release() {
    let key: [u8; 64] = std::array::from_fn(|i| [0xde, 0xad][i % 2]);
    let sig: [u8; 64] = std::array::from_fn(|i| [0xbe, 0xef][i % 2]);
    let data = image(false, Tail::Signature);
    let before = Image::parse(&data).unwrap();
    let digest = before.hash_data(FLASH_BASE).unwrap();
    let off = before.signature_offset().unwrap();

    let signed = before.sign(&key, &sig).unwrap();
    let img = Image::parse(&signed).unwrap();
    assert_eq!(img.signature().unwrap(), (&key[..], &sig[..]));
    assert_eq!(img.signature_offset(), Some(off));
    assert_eq!(img.hash_data(FLASH_BASE).unwrap(), digest);
    // A signed image carries no HASH_VALUE before or after.
    assert!(matches!(
        img.hash(),
        Err(PicobinError::MissingItem("HASH_VALUE"))
    ));

    // Only the signature item body changed.
    assert_eq!(signed.len(), data.len());
    assert_eq!(signed[..off], data[..off]);
    assert_eq!(signed[off + 128..], data[off + 128..]);
}

#[test]
fn replaces_hash_value() {
    let key = [0xde; 64];
    let sig = [0xbe; 64];
    let data = image(false, Tail::Hash);
    let before = Image::parse(&data).unwrap();
    let signed = before.sign(&key, &sig).unwrap();
    assert_eq!(signed.len(), data.len() + 96);

    let img = Image::parse(&signed).unwrap();
    assert_eq!(img.signature().unwrap(), (&key[..], &sig[..]));
    assert!(img.hash().is_err());
    // The signed digest does not cover the signature.
    assert_eq!(
        img.hash_data(FLASH_BASE).unwrap(),
        before.hash_data(FLASH_BASE).unwrap()
    );
}

#[test]
fn hash_value_must_be_last() {
    let mut data = image(false, Tail::Hash);
    // Turn LAST into an ignored item and close the block again.
    let last = data.len() - 12;
    assert_eq!(data[last], ITEM_LAST);
    data.truncate(last);
    data.extend_from_slice(&[0x7e, 1, 0, 0]);
    data.extend_from_slice(&[ITEM_LAST, 1 + 7 + 2 + 9 + 1, 0, 0]);
    push(&mut data, 0);
    push(&mut data, FOOTER);
    let img = Image::parse(&data).unwrap();
    assert_eq!(
        img.sign(&[0; 64], &[0; 64]).unwrap_err(),
        PicobinError::HashValueNotLast
    );
}

// ============================================================================
// Robustness
// ============================================================================

proptest! {
    #[test]
    fn parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(img) = Image::parse(&data) {
            let _ = img.hash();
            let _ = img.signature();
            let _ = img.hash_data(FLASH_BASE);
        }
    }

    #[test]
    fn corrupted_images_never_panic(pos in 0usize..512, byte in any::<u8>()) {
        let mut data = image(false, Tail::Hash);
        let pos = pos % data.len();
        data[pos] = byte;
        if let Ok(img) = Image::parse(&data) {
            let _ = img.hash_data(FLASH_BASE);
            let _ = img.sign(&[1; 64], &[2; 64]);
        }
    }
}
