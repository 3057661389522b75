//! NDEF decoding
//!
//! [`MessageReader`] unwraps NDEF messages from the TLV blocks of a tag
//! memory image, and [`RecordReader`] walks the records of one or more
//! concatenated messages, yielding the text and URI records.

use std::io::{self, Read};

use crate::error::{NfcError, Result};

pub const TLV_NULL: u8 = 0x00;
pub const TLV_NDEF: u8 = 0x03;
pub const TLV_TERMINATOR: u8 = 0xfe;

pub const FLAG_IL: u8 = 1 << 3;
pub const FLAG_SR: u8 = 1 << 4;
pub const FLAG_CF: u8 = 1 << 5;
pub const FLAG_ME: u8 = 1 << 6;
pub const FLAG_MB: u8 = 1 << 7;

pub const TNF_WELL_KNOWN: u8 = 0x01;

/// URI identifier codes understood by [`RecordReader`].
const URI_PREFIXES: [&str; 5] = ["", "http://www.", "https://www.", "http://", "https://"];

/// Read the first byte, or `None` at a clean end of stream.
fn first_byte(r: &mut impl Read) -> io::Result<Option<u8>> {
    let mut b = [0u8; 1];
    loop {
        match r.read(&mut b) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(b[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn byte(r: &mut impl Read) -> io::Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

/// Concatenated contents of the NDEF TLVs in a tag memory image.
///
/// Null TLVs are skipped, other TLV types are read past and the terminator
/// TLV ends the stream.
pub struct MessageReader<R> {
    r: R,
    remaining: usize,
    skip: bool,
    done: bool,
}

impl<R: Read> MessageReader<R> {
    pub fn new(r: R) -> Self {
        Self {
            r,
            remaining: 0,
            skip: false,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.r
    }
}

impl<R: Read> Read for MessageReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut scratch = [0u8; 256];
        loop {
            if self.done {
                return Ok(0);
            }
            if self.remaining > 0 {
                let dst: &mut [u8] = if self.skip { &mut scratch } else { &mut *buf };
                let l = dst.len().min(self.remaining);
                if l == 0 {
                    return Ok(0);
                }
                let n = self.r.read(&mut dst[..l])?;
                if n == 0 {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
                self.remaining -= n;
                if self.skip {
                    continue;
                }
                return Ok(n);
            }
            let Some(typ) = first_byte(&mut self.r)? else {
                self.done = true;
                return Ok(0);
            };
            match typ {
                TLV_NULL => continue,
                TLV_TERMINATOR => {
                    self.done = true;
                    return Ok(0);
                }
                _ => {}
            }
            let mut len = usize::from(byte(&mut self.r)?);
            if len == 0xff {
                let mut b = [0u8; 2];
                self.r.read_exact(&mut b)?;
                len = usize::from(u16::from_be_bytes(b));
            }
            if typ != TLV_NDEF {
                tracing::trace!("Skipping TLV {:#04x} of {} bytes", typ, len);
            }
            self.remaining = len;
            self.skip = typ != TLV_NDEF;
        }
    }
}

/// A decoded NDEF record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Well-known `T` record, language code stripped
    Text(String),
    /// Well-known `U` record with its prefix expanded
    Uri(String),
}

impl Record {
    pub fn as_str(&self) -> &str {
        match self {
            Record::Text(s) | Record::Uri(s) => s,
        }
    }
}

/// Records of concatenated NDEF messages.
///
/// Chunked records, UTF-16 text, unknown URI prefixes and anything but
/// well-known `T` and `U` records are skipped.
pub struct RecordReader<R> {
    r: R,
    in_message: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(r: R) -> Self {
        Self {
            r,
            in_message: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.r
    }

    /// The next supported record, or `None` at the end of the stream.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            let Some(flags) = first_byte(&mut self.r)? else {
                return Ok(None);
            };
            let begin = flags & FLAG_MB != 0;
            let end = flags & FLAG_ME != 0;
            match (begin, self.in_message) {
                (false, false) => return Err(NfcError::ExpectedStartRecord),
                (true, true) => return Err(NfcError::UnexpectedStartRecord),
                _ => {}
            }
            self.in_message = !end;

            let type_len = usize::from(byte(&mut self.r)?);
            let payload_len = if flags & FLAG_SR != 0 {
                u64::from(byte(&mut self.r)?)
            } else {
                let mut b = [0u8; 4];
                self.r.read_exact(&mut b)?;
                u64::from(u32::from_be_bytes(b))
            };
            let id_len = if flags & FLAG_IL != 0 {
                usize::from(byte(&mut self.r)?)
            } else {
                0
            };
            let mut typ = vec![0u8; type_len];
            self.r.read_exact(&mut typ)?;
            self.discard(id_len as u64)?;

            let supported = flags & FLAG_CF == 0
                && flags & 0b111 == TNF_WELL_KNOWN
                && matches!(typ[..], [b'T'] | [b'U']);
            if !supported {
                self.discard(payload_len)?;
                continue;
            }
            let mut payload = Vec::new();
            (&mut self.r).take(payload_len).read_to_end(&mut payload)?;
            if payload.len() as u64 != payload_len {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            let record = match typ[0] {
                b'T' => text(&payload)?.map(Record::Text),
                _ => uri(&payload)?.map(Record::Uri),
            };
            if let Some(r) = record {
                return Ok(Some(r));
            }
        }
    }

    fn discard(&mut self, n: u64) -> Result<()> {
        let got = io::copy(&mut (&mut self.r).take(n), &mut io::sink())?;
        if got != n {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn text(payload: &[u8]) -> Result<Option<String>> {
    let Some((&status, rest)) = payload.split_first() else {
        return Ok(None);
    };
    if status & 0x80 != 0 {
        // UTF-16.
        return Ok(None);
    }
    let lang = usize::from(status & 0x3f);
    let text = rest.get(lang..).ok_or(NfcError::TextLanguageTooLong)?;
    String::from_utf8(text.to_vec())
        .map(Some)
        .map_err(|_| NfcError::InvalidUtf8)
}

fn uri(payload: &[u8]) -> Result<Option<String>> {
    let Some((&code, rest)) = payload.split_first() else {
        return Ok(None);
    };
    let Some(prefix) = URI_PREFIXES.get(usize::from(code)) else {
        return Ok(None);
    };
    let rest = std::str::from_utf8(rest).map_err(|_| NfcError::InvalidUtf8)?;
    Ok(Some(format!("{prefix}{rest}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_prefixes() {
        assert_eq!(uri(b"\x00urn:x").unwrap().unwrap(), "urn:x");
        assert_eq!(uri(b"\x03a.b").unwrap().unwrap(), "http://a.b");
        assert_eq!(uri(b"\x05a.b").unwrap(), None);
        assert_eq!(uri(b"").unwrap(), None);
    }

    #[test]
    fn text_strips_language() {
        assert_eq!(text(b"\x02enhi").unwrap().unwrap(), "hi");
        assert_eq!(text(b"\x82en\x00h").unwrap(), None);
        assert!(matches!(
            text(b"\x05en"),
            Err(NfcError::TextLanguageTooLong)
        ));
    }
}
