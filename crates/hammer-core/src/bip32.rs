//! BIP-32 hierarchical deterministic keys over secp256k1

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, NonZeroScalar, ProjectivePoint, PublicKey, Scalar, SecretKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};

/// First hardened child index.
pub const HARDENED: u32 = 0x8000_0000;

/// Serialized extended key length, before the base58 checksum.
const SERIALIZED_LEN: usize = 78;

type HmacSha512 = Hmac<Sha512>;

/// A derivation path, stored as raw child numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<u32>);

impl Path {
    pub fn new(components: Vec<u32>) -> Self {
        Self(components)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse `m/84h/0'/0`. Hardened elements take either `h` or `'`.
    pub fn parse(path: &str) -> Result<Self> {
        let mut parts = path.split('/');
        if parts.next() != Some("m") {
            return Err(CoreError::InvalidPath(format!("missing m/ prefix: {path:?}")));
        }
        parts.map(parse_element).collect::<Result<Vec<_>>>().map(Self)
    }

    /// The path without the leading `m`, as in descriptor key origins.
    pub fn encode(&self) -> String {
        let mut s = String::new();
        for &c in &self.0 {
            s.push('/');
            s.push_str(&element_string(c));
        }
        s
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.encode())
    }
}

impl FromStr for Path {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl From<Vec<u32>> for Path {
    fn from(v: Vec<u32>) -> Self {
        Self(v)
    }
}

fn element_string(c: u32) -> String {
    if c >= HARDENED {
        format!("{}h", c - HARDENED)
    } else {
        c.to_string()
    }
}

/// Parse one path element such as `84h`.
pub fn parse_element(p: &str) -> Result<u32> {
    let (digits, offset) = match p.strip_suffix(['h', '\'']) {
        Some(d) => (d, HARDENED),
        None => (p, 0),
    };
    let idx: u32 = digits
        .parse()
        .map_err(|_| CoreError::InvalidPath(format!("invalid path element: {p:?}")))?;
    if idx >= HARDENED {
        return Err(CoreError::InvalidPath(format!("path element out of range: {p:?}")));
    }
    Ok(idx + offset)
}

/// Network of an extended key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    fn versions(self) -> (u32, u32) {
        match self {
            Network::Mainnet => (0x0488_b21e, 0x0488_ade4),
            Network::Testnet => (0x0435_87cf, 0x0435_8394),
        }
    }

    fn from_version(v: u32) -> Option<(Network, bool)> {
        [Network::Mainnet, Network::Testnet].into_iter().find_map(|n| {
            let (public, private) = n.versions();
            if v == public {
                Some((n, false))
            } else if v == private {
                Some((n, true))
            } else {
                None
            }
        })
    }
}

#[derive(Clone)]
enum Key {
    Private(SecretKey),
    Public(PublicKey),
}

/// An extended private or public key.
#[derive(Clone)]
pub struct ExtendedKey {
    network: Network,
    depth: u8,
    parent_fingerprint: u32,
    child_number: u32,
    chain_code: [u8; 32],
    key: Key,
}

impl ExtendedKey {
    /// Master key from a BIP-32 seed.
    pub fn from_seed(seed: &[u8], network: Network) -> Result<Self> {
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .map_err(|e| CoreError::Bip32(e.to_string()))?;
        mac.update(seed);
        let i = Zeroizing::new(mac.finalize().into_bytes());
        let secret = SecretKey::from_slice(&i[..32])
            .map_err(|_| CoreError::Bip32("unusable seed".into()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);
        Ok(Self {
            network,
            depth: 0,
            parent_fingerprint: 0,
            child_number: 0,
            chain_code,
            key: Key::Private(secret),
        })
    }

    /// Build a public extended key from its parts.
    pub fn from_public_parts(
        network: Network,
        depth: u8,
        parent_fingerprint: u32,
        child_number: u32,
        chain_code: [u8; 32],
        key_data: &[u8],
    ) -> Result<Self> {
        let public = PublicKey::from_sec1_bytes(key_data)
            .map_err(|_| CoreError::Bip32("invalid public key".into()))?;
        Ok(Self {
            network,
            depth,
            parent_fingerprint,
            child_number,
            chain_code,
            key: Key::Public(public),
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> u32 {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn is_private(&self) -> bool {
        matches!(self.key, Key::Private(_))
    }

    pub fn public_key(&self) -> PublicKey {
        match &self.key {
            Key::Private(sk) => sk.public_key(),
            Key::Public(pk) => *pk,
        }
    }

    /// The 32-byte private key, if any.
    pub fn secret_bytes(&self) -> Option<Zeroizing<[u8; 32]>> {
        match &self.key {
            Key::Private(sk) => Some(Zeroizing::new(sk.to_bytes().into())),
            Key::Public(_) => None,
        }
    }

    /// 33-byte compressed public key.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out.copy_from_slice(self.public_key().to_encoded_point(true).as_bytes());
        out
    }

    /// Fingerprint of this key: the first four bytes of HASH160.
    pub fn fingerprint(&self) -> u32 {
        fingerprint(&self.public_key_bytes())
    }

    /// The public counterpart of this key.
    pub fn public(&self) -> Self {
        Self {
            key: Key::Public(self.public_key()),
            ..self.clone()
        }
    }

    pub fn derive_child(&self, index: u32) -> Result<Self> {
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|e| CoreError::Bip32(e.to_string()))?;
        match &self.key {
            Key::Private(sk) if index >= HARDENED => {
                let secret = Zeroizing::new(sk.to_bytes());
                mac.update(&[0]);
                mac.update(&secret);
            }
            Key::Public(_) if index >= HARDENED => {
                return Err(CoreError::Bip32("hardened derivation from public key".into()));
            }
            _ => mac.update(&self.public_key_bytes()),
        }
        mac.update(&index.to_be_bytes());
        let i = Zeroizing::new(mac.finalize().into_bytes());

        let il: Option<Scalar> = Scalar::from_repr(*FieldBytes::from_slice(&i[..32])).into();
        let il = il.ok_or_else(|| CoreError::Bip32("derived key out of range".into()))?;
        let key = match &self.key {
            Key::Private(sk) => {
                let child = il + *sk.to_nonzero_scalar();
                let child: Option<NonZeroScalar> = NonZeroScalar::new(child).into();
                let child = child.ok_or_else(|| CoreError::Bip32("derived zero key".into()))?;
                Key::Private(SecretKey::from(child))
            }
            Key::Public(pk) => {
                let point = ProjectivePoint::GENERATOR * il + pk.to_projective();
                let pk = PublicKey::from_affine(point.to_affine())
                    .map_err(|_| CoreError::Bip32("derived point at infinity".into()))?;
                Key::Public(pk)
            }
        };
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);
        Ok(Self {
            network: self.network,
            depth: self.depth.saturating_add(1),
            parent_fingerprint: self.fingerprint(),
            child_number: index,
            chain_code,
            key,
        })
    }

    pub fn derive_path(&self, path: &Path) -> Result<Self> {
        path.components()
            .iter()
            .try_fold(self.clone(), |key, &c| key.derive_child(c))
    }

    fn serialize(&self) -> Zeroizing<Vec<u8>> {
        let (public, private) = self.network.versions();
        let mut out = Zeroizing::new(Vec::with_capacity(SERIALIZED_LEN));
        let version = if self.is_private() { private } else { public };
        out.extend_from_slice(&version.to_be_bytes());
        out.push(self.depth);
        out.extend_from_slice(&self.parent_fingerprint.to_be_bytes());
        out.extend_from_slice(&self.child_number.to_be_bytes());
        out.extend_from_slice(&self.chain_code);
        match &self.key {
            Key::Private(sk) => {
                out.push(0);
                out.extend_from_slice(&sk.to_bytes());
            }
            Key::Public(_) => out.extend_from_slice(&self.public_key_bytes()),
        }
        out
    }
}

impl fmt::Display for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = Zeroizing::new(bs58::encode(self.serialize().as_slice()).with_check().into_string());
        f.write_str(&encoded)
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("network", &self.network)
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

impl FromStr for ExtendedKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let data = Zeroizing::new(
            bs58::decode(s)
                .with_check(None)
                .into_vec()
                .map_err(|e| CoreError::Bip32(format!("invalid extended key: {e}")))?,
        );
        if data.len() != SERIALIZED_LEN {
            return Err(CoreError::Bip32(format!("invalid extended key length {}", data.len())));
        }
        let be32 = |b: &[u8]| u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let (network, private) = Network::from_version(be32(&data[0..4]))
            .ok_or_else(|| CoreError::Bip32("unknown extended key version".into()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        let key_data = &data[45..78];
        let key = if private {
            if key_data[0] != 0 {
                return Err(CoreError::Bip32("invalid private key prefix".into()));
            }
            Key::Private(
                SecretKey::from_slice(&key_data[1..])
                    .map_err(|_| CoreError::Bip32("invalid private key".into()))?,
            )
        } else {
            Key::Public(
                PublicKey::from_sec1_bytes(key_data)
                    .map_err(|_| CoreError::Bip32("invalid public key".into()))?,
            )
        };
        Ok(Self {
            network,
            depth: data[4],
            parent_fingerprint: be32(&data[5..9]),
            child_number: be32(&data[9..13]),
            chain_code,
            key,
        })
    }
}

impl PartialEq for ExtendedKey {
    fn eq(&self, other: &Self) -> bool {
        self.serialize() == other.serialize()
    }
}

impl Eq for ExtendedKey {}

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// Big-endian first four bytes of HASH160 of a compressed public key.
pub fn fingerprint(public_key: &[u8]) -> u32 {
    let h = hash160(public_key);
    u32::from_be_bytes([h[0], h[1], h[2], h[3]])
}

/// Derive `path` from `master`, returning the master fingerprint and the
/// public key at the end of the path.
pub fn derive(master: &ExtendedKey, path: &Path) -> Result<(u32, ExtendedKey)> {
    let key = master.derive_path(path)?;
    Ok((master.fingerprint(), key.public()))
}
