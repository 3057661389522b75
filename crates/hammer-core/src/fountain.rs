//! Fountain codes for multi-part UR messages
//!
//! A part is the CBOR array `[seq_num, seq_len, message_len, checksum,
//! fragment]`. Parts numbered up to `seq_len` carry one fragment each;
//! higher numbers carry the XOR of a pseudo-randomly chosen set.

use std::collections::{BTreeMap, BTreeSet};

use ciborium::Value;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::xoshiro::Xoshiro256;

/// CRC32 of a complete message.
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Length of each fragment of a `message_len` byte message split `seq_len` ways.
pub fn fragment_len(message_len: usize, seq_len: usize) -> usize {
    message_len.div_ceil(seq_len)
}

/// Encode part `seq_num` of `message` split into `seq_len` fragments. A
/// single-part message is returned as is.
pub fn encode(message: &[u8], seq_num: u32, seq_len: usize) -> Result<Vec<u8>> {
    if seq_len == 1 {
        return Ok(message.to_vec());
    }
    if seq_len == 0 || seq_num == 0 {
        return Err(CoreError::Fountain("sequence numbers start at 1".into()));
    }
    let n = fragment_len(message.len(), seq_len);
    let check = checksum(message);
    let mut payload = vec![0u8; n];
    for idx in choose_fragments(seq_num, seq_len, check) {
        let start = idx * n;
        if start > message.len() {
            continue;
        }
        for (p, b) in payload.iter_mut().zip(&message[start..]) {
            *p ^= b;
        }
    }
    let value = Value::Array(vec![
        Value::from(seq_num),
        Value::from(seq_len as u64),
        Value::from(message.len() as u64),
        Value::from(check),
        Value::Bytes(payload),
    ]);
    let mut out = Vec::new();
    ciborium::ser::into_writer(&value, &mut out).map_err(|e| CoreError::Cbor(e.to_string()))?;
    Ok(out)
}

/// Fragment indices mixed into part `seq_num`.
pub fn choose_fragments(seq_num: u32, seq_len: usize, checksum: u32) -> Vec<usize> {
    if seq_num as usize <= seq_len {
        return vec![seq_num.saturating_sub(1) as usize];
    }
    let mut seed = [0u8; 8];
    seed[..4].copy_from_slice(&seq_num.to_be_bytes());
    seed[4..].copy_from_slice(&checksum.to_be_bytes());
    let mut rng = Xoshiro256::from_seed(Sha256::digest(seed).into());
    let degree = choose_degree(seq_len, &mut rng);
    let mut items: Vec<usize> = (0..seq_len).collect();
    let mut shuffled = Vec::with_capacity(seq_len);
    while !items.is_empty() {
        let idx = rng.next_int(items.len());
        shuffled.push(items.remove(idx));
    }
    shuffled.truncate(degree);
    shuffled
}

/// The smallest sequence number whose part mixes exactly `indices`.
pub fn seq_num_for(seq_len: usize, checksum: u32, indices: &[usize]) -> Option<u32> {
    let want: BTreeSet<usize> = indices.iter().copied().collect();
    if want.is_empty() || want.len() != indices.len() || want.iter().any(|&i| i >= seq_len) {
        return None;
    }
    (1..=u32::MAX).find(|&seq_num| {
        let got = choose_fragments(seq_num, seq_len, checksum);
        got.len() == want.len() && got.iter().all(|i| want.contains(i))
    })
}

fn choose_degree(seq_len: usize, rng: &mut Xoshiro256) -> usize {
    let probs: Vec<f64> = (0..seq_len).map(|i| 1.0 / (i + 1) as f64).collect();
    sample(&probs, rng) + 1
}

// Vose's alias method.
fn sample(weights: &[f64], rng: &mut Xoshiro256) -> usize {
    let n = weights.len();
    let sum: f64 = weights.iter().sum();
    let mut p: Vec<f64> = weights.iter().map(|w| w * n as f64 / sum).collect();

    let mut small = Vec::new();
    let mut large = Vec::new();
    for i in (0..n).rev() {
        if p[i] < 1.0 {
            small.push(i);
        } else {
            large.push(i);
        }
    }

    let mut probs = vec![0.0; n];
    let mut aliases = vec![0usize; n];
    while !small.is_empty() && !large.is_empty() {
        let (Some(a), Some(g)) = (small.pop(), large.pop()) else {
            break;
        };
        probs[a] = p[a];
        aliases[a] = g;
        p[g] += p[a] - 1.0;
        if p[g] < 1.0 {
            small.push(g);
        } else {
            large.push(g);
        }
    }
    for i in large.into_iter().chain(small) {
        probs[i] = 1.0;
    }

    let r1 = rng.next_f64();
    let r2 = rng.next_f64();
    let i = (n as f64 * r1) as usize;
    if r2 < probs[i] {
        i
    } else {
        aliases[i]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    seq_len: usize,
    message_len: usize,
    checksum: u32,
}

#[derive(Debug, Clone)]
struct Part {
    fragments: BTreeSet<usize>,
    data: Vec<u8>,
}

impl Part {
    /// Remove `other` from `self` if its fragments are a strict subset.
    fn reduce(&mut self, other: &Part) {
        if other.fragments.len() >= self.fragments.len()
            || !other.fragments.is_subset(&self.fragments)
        {
            return;
        }
        self.fragments = self.fragments.difference(&other.fragments).copied().collect();
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a ^= b;
        }
    }

    fn single(&self) -> Option<usize> {
        if self.fragments.len() == 1 {
            self.fragments.first().copied()
        } else {
            None
        }
    }
}

/// Incremental decoder for fountain parts.
#[derive(Debug, Default)]
pub struct Decoder {
    header: Option<Header>,
    mixed: BTreeMap<Vec<usize>, Part>,
    completed: BTreeMap<usize, Part>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimated completion in [0, 1].
    pub fn progress(&self) -> f32 {
        let Some(header) = self.header else {
            return 0.0;
        };
        let estimated = header.seq_len as f32 * 1.75;
        ((self.completed.len() + self.mixed.len()) as f32 / estimated).min(1.0)
    }

    pub fn add(&mut self, data: &[u8]) -> Result<()> {
        let (seq_num, header, payload) = decode_part(data)?;
        match self.header {
            Some(h) if h != header => {
                return Err(CoreError::Fountain("incompatible fragment".into()));
            }
            Some(_) => {}
            None => self.header = Some(header),
        }
        let fragments: BTreeSet<usize> = choose_fragments(seq_num, header.seq_len, header.checksum)
            .into_iter()
            .collect();
        tracing::trace!(seq_num, ?fragments, "fountain part");
        let mut queue = vec![Part { fragments, data: payload }];

        while let Some(mut p) = queue.pop() {
            if let Some(idx) = p.single() {
                self.reduce_mixed(&p, &mut queue);
                self.completed.insert(idx, p);
                continue;
            }
            for other in self.completed.values().chain(self.mixed.values()) {
                p.reduce(other);
            }
            if p.single().is_some() {
                queue.push(p);
            } else {
                self.reduce_mixed(&p, &mut queue);
                self.mixed.insert(p.fragments.iter().copied().collect(), p);
            }
        }
        Ok(())
    }

    fn reduce_mixed(&mut self, p: &Part, queue: &mut Vec<Part>) {
        for (_, mut other) in std::mem::take(&mut self.mixed) {
            other.reduce(p);
            if other.single().is_some() {
                queue.push(other);
            } else {
                self.mixed.insert(other.fragments.iter().copied().collect(), other);
            }
        }
    }

    /// The reassembled message, or `None` while fragments are missing.
    pub fn result(&self) -> Result<Option<Vec<u8>>> {
        let Some(header) = self.header else {
            return Ok(None);
        };
        if self.completed.len() != header.seq_len {
            return Ok(None);
        }
        let mut msg: Vec<u8> = self.completed.values().flat_map(|p| p.data.iter().copied()).collect();
        if msg.len() < header.message_len {
            return Err(CoreError::Fountain("message too short".into()));
        }
        msg.truncate(header.message_len);
        if checksum(&msg) != header.checksum {
            return Err(CoreError::Fountain("mismatched checksum".into()));
        }
        Ok(Some(msg))
    }
}

fn decode_part(data: &[u8]) -> Result<(u32, Header, Vec<u8>)> {
    let value: Value =
        ciborium::de::from_reader(data).map_err(|e| CoreError::Fountain(format!("failed to decode fragment: {e}")))?;
    let Value::Array(items) = value else {
        return Err(CoreError::Fountain("fragment is not an array".into()));
    };
    let [seq_num, seq_len, message_len, check, Value::Bytes(payload)] = <[Value; 5]>::try_from(items)
        .map_err(|_| CoreError::Fountain("fragment has wrong arity".into()))?
    else {
        return Err(CoreError::Fountain("fragment data is not a byte string".into()));
    };
    let int = |v: Value| -> Result<u64> {
        v.as_integer()
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| CoreError::Fountain("invalid fragment header".into()))
    };
    let seq_num = u32::try_from(int(seq_num)?).map_err(|_| CoreError::Fountain("seq_num out of range".into()))?;
    let header = Header {
        seq_len: int(seq_len)? as usize,
        message_len: int(message_len)? as usize,
        checksum: u32::try_from(int(check)?).map_err(|_| CoreError::Fountain("checksum out of range".into()))?,
    };
    if seq_num == 0 || header.seq_len == 0 {
        return Err(CoreError::Fountain("sequence numbers start at 1".into()));
    }
    if payload.len() != fragment_len(header.message_len, header.seq_len) {
        return Err(CoreError::Fountain("fragment length mismatch".into()));
    }
    Ok((seq_num, header, payload))
}
