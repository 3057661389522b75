//! Uniform Resources: `ur:<type>/<bytewords>` and `ur:<type>/<seq>-<len>/<bytewords>`

use crate::bytewords;
use crate::error::{CoreError, Result};
use crate::fountain;

const SCHEME: &str = "ur:";

/// Encode part `seq_num` of `seq_len` as a lowercase UR.
pub fn encode(ur_type: &str, message: &[u8], seq_num: u32, seq_len: usize) -> Result<String> {
    if seq_len == 1 {
        return Ok(format!("{SCHEME}{ur_type}/{}", bytewords::encode(message)));
    }
    let part = fountain::encode(message, seq_num, seq_len)?;
    Ok(format!(
        "{SCHEME}{ur_type}/{seq_num}-{seq_len}/{}",
        bytewords::encode(&part)
    ))
}

/// Collects single- or multi-part URs of one type.
#[derive(Debug, Default)]
pub struct Decoder {
    ur_type: Option<String>,
    data: Option<Vec<u8>>,
    fountain: fountain::Decoder,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> f32 {
        if self.data.is_some() {
            return 1.0;
        }
        self.fountain.progress()
    }

    /// The type and message once complete.
    pub fn result(&self) -> Result<Option<(String, Vec<u8>)>> {
        let Some(ur_type) = &self.ur_type else {
            return Ok(None);
        };
        if let Some(data) = &self.data {
            return Ok(Some((ur_type.clone(), data.clone())));
        }
        Ok(self.fountain.result()?.map(|msg| (ur_type.clone(), msg)))
    }

    pub fn add(&mut self, ur: &str) -> Result<()> {
        let ur = ur.to_ascii_lowercase();
        let rest = ur
            .strip_prefix(SCHEME)
            .ok_or_else(|| CoreError::Ur("missing ur: prefix".into()))?;
        let parts: Vec<&str> = rest.splitn(3, '/').collect();
        let (ur_type, seq, fragment) = match parts[..] {
            [t, f] => (t, None, f),
            [t, s, f] => (t, Some(s), f),
            _ => return Err(CoreError::Ur("incomplete UR".into())),
        };
        if self.ur_type.as_deref().is_some_and(|t| t != ur_type) {
            tracing::debug!(expected = ?self.ur_type, got = ur_type, "rejecting UR part");
            return Err(CoreError::Ur("incompatible fragment".into()));
        }
        let enc = bytewords::decode(fragment)
            .map_err(|e| CoreError::Ur(format!("invalid fragment: {e}")))?;
        match seq {
            Some(seq) => {
                parse_sequence(seq)?;
                self.fountain.add(&enc)?;
            }
            None => self.data = Some(enc),
        }
        self.ur_type = Some(ur_type.to_string());
        Ok(())
    }
}

fn parse_sequence(seq: &str) -> Result<(u32, u32)> {
    let invalid = || CoreError::Ur(format!("invalid sequence {seq:?}"));
    let (n, len) = seq.split_once('-').ok_or_else(invalid)?;
    Ok((n.parse().map_err(|_| invalid())?, len.parse().map_err(|_| invalid())?))
}
