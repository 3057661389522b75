//! UR registry types: `crypto-output`, `crypto-hdkey`, `crypto-seed` and `bytes`
//!
//! Output descriptors nest script tags around a key expression:
//!
//! | Script       | Tags            |
//! |--------------|-----------------|
//! | P2SH         | 400             |
//! | P2SH-P2WSH   | 400, 401        |
//! | P2SH-P2WPKH  | 400, 404        |
//! | P2PKH        | 403             |
//! | P2WSH        | 401             |
//! | P2WPKH       | 404             |
//! | P2TR         | 409             |
//!
//! The key expression is a single `crypto-hdkey` (303) or a `multi` (406)
//! or `sortedmulti` (407) map of threshold and keys.

use std::fmt;

use ciborium::Value;

use crate::bip32::{ExtendedKey, Network, Path, HARDENED};
use crate::error::{CoreError, Result};

pub const TAG_HDKEY: u64 = 303;
pub const TAG_KEYPATH: u64 = 304;
pub const TAG_USE_INFO: u64 = 305;
pub const TAG_SH: u64 = 400;
pub const TAG_WSH: u64 = 401;
pub const TAG_P2PKH: u64 = 403;
pub const TAG_WPKH: u64 = 404;
pub const TAG_MULTI: u64 = 406;
pub const TAG_SORTED_MULTI: u64 = 407;
pub const TAG_TR: u64 = 409;

const NETWORK_MAINNET: u64 = 0;
const NETWORK_TESTNET: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    P2sh,
    P2shP2wsh,
    P2shP2wpkh,
    P2pkh,
    P2wsh,
    P2wpkh,
    P2tr,
}

impl Script {
    /// The standard account derivation path for the script.
    pub fn derivation_path(self) -> Path {
        let h = |c: u32| c + HARDENED;
        let comps = match self {
            Script::P2wpkh => vec![h(84), h(0), h(0)],
            Script::P2pkh => vec![h(44), h(0), h(0)],
            Script::P2shP2wpkh => vec![h(49), h(0), h(0)],
            Script::P2tr => vec![h(86), h(0), h(0)],
            Script::P2sh => vec![h(45)],
            Script::P2shP2wsh => vec![h(48), h(0), h(0), h(1)],
            Script::P2wsh => vec![h(48), h(0), h(0), h(2)],
        };
        Path::new(comps)
    }

    fn tags(self) -> &'static [u64] {
        match self {
            Script::P2sh => &[TAG_SH],
            Script::P2shP2wsh => &[TAG_SH, TAG_WSH],
            Script::P2shP2wpkh => &[TAG_SH, TAG_WPKH],
            Script::P2pkh => &[TAG_P2PKH],
            Script::P2wsh => &[TAG_WSH],
            Script::P2wpkh => &[TAG_WPKH],
            Script::P2tr => &[TAG_TR],
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Script::P2sh => "Legacy (P2SH)",
            Script::P2shP2wsh => "Nested Segwit (P2SH-P2WSH)",
            Script::P2shP2wpkh => "Nested Segwit (P2SH-P2WPKH)",
            Script::P2pkh => "Legacy (P2PKH)",
            Script::P2wsh => "Segwit (P2WSH)",
            Script::P2wpkh => "Segwit (P2WPKH)",
            Script::P2tr => "Taproot (P2TR)",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MultisigKind {
    #[default]
    Singlesig,
    Multi,
    SortedMulti,
}

/// One step of a child derivation template such as `<0;1>/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Derivation {
    Child { index: u32, hardened: bool },
    Wildcard { hardened: bool },
    Range { start: u32, end: u32, hardened: bool },
}

/// An extended public key with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub network: Network,
    pub master_fingerprint: u32,
    pub derivation_path: Path,
    pub children: Vec<Derivation>,
    pub key_data: [u8; 33],
    pub chain_code: [u8; 32],
    pub parent_fingerprint: u32,
}

impl KeyDescriptor {
    pub fn extended_key(&self) -> Result<ExtendedKey> {
        let child_number = self.derivation_path.components().last().copied().unwrap_or(0);
        ExtendedKey::from_public_parts(
            self.network,
            u8::try_from(self.derivation_path.len())
                .map_err(|_| CoreError::Bip32("derivation path too deep".into()))?,
            self.parent_fingerprint,
            child_number,
            self.chain_code,
            &self.key_data,
        )
    }

    /// `crypto-hdkey` CBOR encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        to_vec(&self.to_cbor())
    }

    fn to_cbor(&self) -> Value {
        let mut map = vec![
            (int(3), Value::Bytes(self.key_data.to_vec())),
            (int(4), Value::Bytes(self.chain_code.to_vec())),
        ];
        if self.network == Network::Testnet {
            map.push((
                int(5),
                Value::Tag(TAG_USE_INFO, Box::new(Value::Map(vec![(int(2), int(NETWORK_TESTNET))]))),
            ));
        }
        let mut origin = Vec::new();
        if !self.derivation_path.is_empty() {
            let comps = self
                .derivation_path
                .components()
                .iter()
                .flat_map(|&c| [int(u64::from(c & !HARDENED)), Value::Bool(c >= HARDENED)])
                .collect();
            origin.push((int(1), Value::Array(comps)));
        }
        if self.master_fingerprint != 0 {
            origin.push((int(2), int(u64::from(self.master_fingerprint))));
        }
        if !origin.is_empty() {
            map.push((int(6), Value::Tag(TAG_KEYPATH, Box::new(Value::Map(origin)))));
        }
        if !self.children.is_empty() {
            let comps = self
                .children
                .iter()
                .flat_map(|d| match *d {
                    Derivation::Child { index, hardened } => [int(u64::from(index)), Value::Bool(hardened)],
                    Derivation::Wildcard { hardened } => [Value::Array(Vec::new()), Value::Bool(hardened)],
                    Derivation::Range { start, end, hardened } => [
                        Value::Array(vec![int(u64::from(start)), int(u64::from(end))]),
                        Value::Bool(hardened),
                    ],
                })
                .collect();
            map.push((
                int(7),
                Value::Tag(TAG_KEYPATH, Box::new(Value::Map(vec![(int(1), Value::Array(comps))]))),
            ));
        }
        if self.parent_fingerprint != 0 {
            map.push((int(8), int(u64::from(self.parent_fingerprint))));
        }
        Value::Map(map)
    }
}

impl fmt::Display for KeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.extended_key() {
            Ok(k) => fmt::Display::fmt(&k, f),
            Err(_) => f.write_str("<invalid key>"),
        }
    }
}

/// A wallet output descriptor. Equality ignores the title.
#[derive(Debug, Clone)]
pub struct OutputDescriptor {
    pub title: String,
    pub script: Script,
    pub kind: MultisigKind,
    pub threshold: usize,
    pub keys: Vec<KeyDescriptor>,
}

impl PartialEq for OutputDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.script == other.script
            && self.kind == other.kind
            && self.threshold == other.threshold
            && self.keys == other.keys
    }
}

impl Eq for OutputDescriptor {}

impl OutputDescriptor {
    /// Deterministic `crypto-output` CBOR encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut v = match self.kind {
            MultisigKind::Singlesig => {
                let key = self
                    .keys
                    .first()
                    .ok_or_else(|| CoreError::Cbor("descriptor has no keys".into()))?;
                Value::Tag(TAG_HDKEY, Box::new(key.to_cbor()))
            }
            MultisigKind::Multi | MultisigKind::SortedMulti => {
                let mut map = Vec::new();
                if self.threshold != 0 {
                    map.push((int(1), int(self.threshold as u64)));
                }
                let keys = self
                    .keys
                    .iter()
                    .map(|k| Value::Tag(TAG_HDKEY, Box::new(k.to_cbor())))
                    .collect();
                map.push((int(2), Value::Array(keys)));
                let tag = if self.kind == MultisigKind::SortedMulti {
                    TAG_SORTED_MULTI
                } else {
                    TAG_MULTI
                };
                Value::Tag(tag, Box::new(Value::Map(map)))
            }
        };
        for &tag in self.script.tags().iter().rev() {
            v = Value::Tag(tag, Box::new(v));
        }
        to_vec(&v)
    }
}

/// A decoded UR payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrValue {
    Seed(Vec<u8>),
    Output(OutputDescriptor),
    HdKey(KeyDescriptor),
    Bytes(Vec<u8>),
}

/// Decode the payload of a UR of type `ur_type`.
pub fn parse(ur_type: &str, enc: &[u8]) -> Result<UrValue> {
    let v: Value = ciborium::de::from_reader(enc)
        .map_err(|e| CoreError::Cbor(format!("{ur_type}: {e}")))?;
    let wrap = |e: CoreError| CoreError::Cbor(format!("{ur_type}: {e}"));
    match ur_type {
        "crypto-seed" => {
            let map = v.as_map().ok_or_else(|| wrap(invalid("seed is not a map")))?;
            let payload = get(map, 1)
                .and_then(Value::as_bytes)
                .ok_or_else(|| wrap(invalid("missing seed payload")))?;
            Ok(UrValue::Seed(payload.clone()))
        }
        "crypto-output" => parse_output_descriptor(v).map(UrValue::Output).map_err(wrap),
        "crypto-hdkey" => parse_hdkey(&v).map(UrValue::HdKey).map_err(wrap),
        "bytes" => match v {
            Value::Bytes(b) => Ok(UrValue::Bytes(b)),
            _ => Err(wrap(invalid("not a byte string"))),
        },
        _ => Err(CoreError::Ur(format!("unknown type {ur_type:?}"))),
    }
}

fn parse_output_descriptor(mut v: Value) -> Result<OutputDescriptor> {
    let mut tags = Vec::new();
    while let Value::Tag(t, inner) = v {
        tags.push(t);
        v = *inner;
    }
    let mut tags = tags.into_iter().peekable();
    let first = tags.next().ok_or_else(|| invalid("missing descriptor tag"))?;
    let script = match first {
        TAG_SH => match tags.peek() {
            Some(&TAG_WSH) => {
                tags.next();
                Script::P2shP2wsh
            }
            Some(&TAG_WPKH) => {
                tags.next();
                Script::P2shP2wpkh
            }
            _ => Script::P2sh,
        },
        TAG_P2PKH => Script::P2pkh,
        TAG_TR => Script::P2tr,
        TAG_WSH => Script::P2wsh,
        TAG_WPKH => Script::P2wpkh,
        t => return Err(invalid(&format!("unknown script type tag {t}"))),
    };
    let func = tags.next().ok_or_else(|| invalid("missing descriptor script tag"))?;
    if tags.next().is_some() {
        return Err(invalid("extra tags"));
    }
    let mut desc = OutputDescriptor {
        title: String::new(),
        script,
        kind: MultisigKind::Singlesig,
        threshold: 1,
        keys: Vec::new(),
    };
    match func {
        TAG_HDKEY => desc.keys.push(parse_hdkey(&v)?),
        TAG_MULTI | TAG_SORTED_MULTI => {
            desc.kind = if func == TAG_SORTED_MULTI {
                MultisigKind::SortedMulti
            } else {
                MultisigKind::Multi
            };
            let map = v.as_map().ok_or_else(|| invalid("multi is not a map"))?;
            desc.threshold = match get(map, 1) {
                Some(t) => uint(t)? as usize,
                None => 0,
            };
            let keys = get(map, 2)
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("missing multi keys"))?;
            desc.keys = keys.iter().map(parse_hdkey).collect::<Result<_>>()?;
        }
        t => return Err(invalid(&format!("unknown script function tag {t}"))),
    }
    Ok(desc)
}

fn parse_hdkey(v: &Value) -> Result<KeyDescriptor> {
    let map = untag(v, TAG_HDKEY)
        .as_map()
        .ok_or_else(|| invalid("crypto-hdkey is not a map"))?;

    let mut network = Network::Mainnet;
    if let Some(info) = get(map, 5) {
        let info = untag(info, TAG_USE_INFO)
            .as_map()
            .ok_or_else(|| invalid("invalid coin info"))?;
        let coin_type = get(info, 1).map(uint).transpose()?.unwrap_or(0);
        if coin_type != 0 {
            return Err(invalid(&format!("unsupported coin type {coin_type}")));
        }
        network = match get(info, 2).map(uint).transpose()?.unwrap_or(NETWORK_MAINNET) {
            NETWORK_MAINNET => Network::Mainnet,
            NETWORK_TESTNET => Network::Testnet,
            n => return Err(invalid(&format!("unknown coin info network {n}"))),
        };
    }

    let children = match get(map, 7) {
        Some(p) => parse_keypath(p)?.0,
        None => Vec::new(),
    };
    let key_data = get(map, 3).and_then(Value::as_bytes).map(Vec::as_slice).unwrap_or_default();
    let key_data: [u8; 33] = key_data
        .try_into()
        .map_err(|_| invalid(&format!("key is {} bytes, expected 33", key_data.len())))?;
    let chain_code = get(map, 4).and_then(Value::as_bytes).map(Vec::as_slice).unwrap_or_default();
    let chain_code: [u8; 32] = chain_code
        .try_into()
        .map_err(|_| invalid(&format!("chain code is {} bytes, expected 32", chain_code.len())))?;

    let (origin, master_fingerprint, depth) = match get(map, 6) {
        Some(p) => parse_keypath(p)?,
        None => (Vec::new(), 0, 0),
    };
    let path = origin
        .into_iter()
        .map(|d| match d {
            Derivation::Child { index, hardened } => Ok(if hardened { index + HARDENED } else { index }),
            _ => Err(invalid("wildcards or ranges not allowed in origin path")),
        })
        .collect::<Result<Vec<u32>>>()?;
    if depth != 0 && depth as usize != path.len() {
        return Err(invalid(&format!("origin depth is {depth} but expected {}", path.len())));
    }
    let parent_fingerprint = match get(map, 8) {
        Some(fp) => u32_of(fp)?,
        None => 0,
    };
    Ok(KeyDescriptor {
        network,
        master_fingerprint,
        derivation_path: Path::new(path),
        children,
        key_data,
        chain_code,
        parent_fingerprint,
    })
}

/// Components, fingerprint and depth of a `crypto-keypath`.
fn parse_keypath(v: &Value) -> Result<(Vec<Derivation>, u32, u64)> {
    let map = untag(v, TAG_KEYPATH)
        .as_map()
        .ok_or_else(|| invalid("keypath is not a map"))?;
    let fingerprint = get(map, 2).map(u32_of).transpose()?.unwrap_or(0);
    let depth = get(map, 3).map(uint).transpose()?.unwrap_or(0);
    let comps: &[Value] = match get(map, 1) {
        Some(c) => c.as_array().ok_or_else(|| invalid("components is not an array"))?,
        None => &[],
    };
    if comps.len() % 2 == 1 {
        return Err(invalid("odd number of components"));
    }
    let path = comps
        .chunks(2)
        .map(|pair| {
            let hardened = pair[1].as_bool().ok_or_else(|| invalid("invalid hardened flag"))?;
            match &pair[0] {
                Value::Integer(_) => Ok(Derivation::Child { index: u32_of(&pair[0])?, hardened }),
                Value::Array(r) if r.is_empty() => Ok(Derivation::Wildcard { hardened }),
                Value::Array(r) if r.len() == 2 => Ok(Derivation::Range {
                    start: u32_of(&r[0]).map_err(|_| invalid("invalid range derivation"))?,
                    end: u32_of(&r[1]).map_err(|_| invalid("invalid range derivation"))?,
                    hardened,
                }),
                Value::Array(_) => Err(invalid("invalid wildcard derivation")),
                _ => Err(invalid("unknown component type")),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((path, fingerprint, depth))
}

fn int(v: u64) -> Value {
    Value::Integer(v.into())
}

fn invalid(msg: &str) -> CoreError {
    CoreError::Cbor(msg.to_string())
}

fn untag(v: &Value, tag: u64) -> &Value {
    match v {
        Value::Tag(t, inner) if *t == tag => inner,
        _ => v,
    }
}

fn get(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| k.as_integer() == Some(key.into()))
        .map(|(_, v)| v)
}

fn uint(v: &Value) -> Result<u64> {
    v.as_integer()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| invalid("expected unsigned integer"))
}

fn u32_of(v: &Value) -> Result<u32> {
    u32::try_from(uint(v)?).map_err(|_| invalid("integer out of range"))
}

fn to_vec(v: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(v, &mut out).map_err(|e| CoreError::Cbor(e.to_string()))?;
    Ok(out)
}
