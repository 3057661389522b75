//! NFC Forum Type 4 tag emulation
//!
//! [`Tag`] plays a writable, empty NDEF tag towards a nearby writer and
//! exposes the files it writes as a byte stream. The stream returns `Ok(0)`
//! at every file boundary: when the writer sleeps or deselects the tag, and
//! when it starts writing the next file.
//!
//! | State            | Reached by                                  |
//! |------------------|---------------------------------------------|
//! | `Init`           | power up, sleep, deselect                   |
//! | `Active`         | RATS, answered with the ATS                 |
//! | `NdefSelected`   | SELECT of the NDEF application              |
//! | `CcFileSelected` | SELECT of the capability container          |
//! | `FileSelected`   | SELECT of the NDEF file                     |

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::error::NfcError;

/// Read and update chunk size announced in the capability container.
pub const CHUNK_SIZE: usize = 128;

/// Frame size for FSCI 8.
pub const MAX_FRAME_SIZE: usize = 256;

const FSCI: u8 = 8;
const NDEF_FILE_ID: u16 = 0x0001;
const MAX_NDEF_SIZE: u16 = 8192;

pub const SENS_REQ: u8 = 0xe0;
pub const SLP_REQ: [u8; 2] = [0x50, 0x00];

pub const DESELECT: u8 = 0xc2;
pub const I_BLOCK: u8 = 0x02;
pub const R_ACK: u8 = 0xa2;
pub const R_NAK: u8 = 0xb2;
pub const MAPPING_VERSION: u8 = 0x20;
pub const CLA: u8 = 0x00;
pub const READ: u8 = 0xb0;
pub const WRITE: u8 = 0xd6;

/// Answer to select: TA(1), TB(1) and TC(1) present, 106 kb/s only,
/// maximum frame waiting time, no NAD nor DID.
pub const ATS: [u8; 5] = [5, 0b0111_0000 | FSCI, 0x00, 8 << 4, 0x00];

pub const ACK: [u8; 2] = [0x90, 0x00];
pub const NAK: [u8; 2] = [0x67, 0x00];

pub const TAG_SELECT: [u8; 12] = [
    0xa4, 0x04, 0x00, 0x07, 0xd2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01, 0x00,
];
pub const CC_SELECT: [u8; 6] = [0xa4, 0x00, 0x0c, 0x02, 0xe1, 0x03];
pub const FILE_SELECT: [u8; 6] = [0xa4, 0x00, 0x0c, 0x02, 0x00, 0x01];

/// Capability container with a single NDEF file control TLV.
pub const CAP_CONTAINER: [u8; 15] = {
    let chunk = (CHUNK_SIZE as u16).to_be_bytes();
    let id = NDEF_FILE_ID.to_be_bytes();
    let max = MAX_NDEF_SIZE.to_be_bytes();
    [
        0x00, 15, // Container size
        MAPPING_VERSION,
        chunk[0], chunk[1], // Read chunk
        chunk[0], chunk[1], // Update chunk
        0x04, 0x06, // NDEF file control TLV
        id[0], id[1],
        max[0], max[1],
        0x00, // Read allowed
        0x00, // Write allowed
    ]
};

/// The NDEF file as read by the writer: a zero length field.
const EMPTY_FILE: [u8; 2] = [0x00, 0x00];

/// Radio front end of the tag.
///
/// Reads yield one frame from the writer, writes send one frame back.
pub trait Device: Read + Write {
    /// Enter sleep, waiting for the writer to wake the tag again.
    fn sleep(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum State {
    Init,
    Active,
    NdefSelected,
    CcFileSelected,
    FileSelected,
}

/// Emulated tag over a [`Device`].
pub struct Tag<D> {
    dev: D,
    state: State,
    block_no: u8,
    next_write_off: usize,
    buf: [u8; MAX_FRAME_SIZE],
    data: VecDeque<u8>,
    boundary: bool,
}

impl<D: Device> Tag<D> {
    pub fn new(dev: D) -> Self {
        Self {
            dev,
            state: State::Init,
            block_no: 0,
            next_write_off: 0,
            buf: [0; MAX_FRAME_SIZE],
            data: VecDeque::new(),
            boundary: false,
        }
    }

    pub fn reset(&mut self) {
        tracing::debug!("Tag reset");
        self.state = State::Init;
        self.data.clear();
        self.next_write_off = 0;
    }

    pub fn into_inner(self) -> D {
        self.dev
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            tracing::debug!("Tag {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }

    /// Handle one frame from the writer. Returns the response, if any, and
    /// an error to surface after responding.
    fn handle(&mut self, n: usize) -> io::Result<(Vec<u8>, Option<NfcError>)> {
        let frame = self.buf[..n].to_vec();
        let mut resp = Vec::new();
        let mut deferred = None;
        let active = self.state >= State::Active;
        match frame[..] {
            [SENS_REQ, _] if self.state <= State::Active => {
                self.block_no = 1;
                self.set_state(State::Active);
                resp.extend_from_slice(&ATS);
            }
            _ if self.state <= State::Active && frame == SLP_REQ => {
                self.dev.sleep()?;
                self.reset();
                self.boundary = true;
            }
            [DESELECT] if active => {
                self.dev.sleep()?;
                self.reset();
                self.boundary = true;
                resp.push(DESELECT);
            }
            [r] if active && r & !1 == R_NAK => {
                if r & 1 != self.block_no {
                    resp.push(R_ACK | self.block_no);
                }
            }
            [i, ref apdu @ ..] if active && i & !1 == I_BLOCK => {
                self.block_no ^= 1;
                resp.push(I_BLOCK | self.block_no);
                match self.apdu(apdu, &mut resp) {
                    Ok(true) => resp.extend_from_slice(&ACK),
                    Ok(false) => resp.extend_from_slice(&NAK),
                    Err(e) => {
                        resp.extend_from_slice(&NAK);
                        deferred = Some(e);
                    }
                }
            }
            _ => tracing::trace!("Ignoring frame {:02x?}", frame),
        }
        Ok((resp, deferred))
    }

    /// Dispatch a command APDU, appending response data to `resp`.
    fn apdu(&mut self, apdu: &[u8], resp: &mut Vec<u8>) -> Result<bool, NfcError> {
        let cmd = match apdu {
            [CLA, cmd @ ..] if apdu.len() >= 4 => cmd,
            _ => return Ok(false),
        };
        if cmd == TAG_SELECT {
            self.set_state(State::NdefSelected);
            return Ok(true);
        }
        if self.state >= State::NdefSelected && cmd == CC_SELECT {
            self.set_state(State::CcFileSelected);
            return Ok(true);
        }
        if self.state >= State::NdefSelected && cmd == FILE_SELECT {
            self.set_state(State::FileSelected);
            self.next_write_off = 0;
            return Ok(true);
        }
        if self.state < State::CcFileSelected {
            return Ok(false);
        }
        match cmd {
            [READ, o0, o1, size] => {
                let file: &[u8] = match self.state {
                    State::CcFileSelected => &CAP_CONTAINER,
                    _ => &EMPTY_FILE,
                };
                let off = usize::from(u16::from_be_bytes([*o0, *o1]));
                match file.get(off..off + usize::from(*size)) {
                    Some(d) => {
                        resp.extend_from_slice(d);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            [WRITE, req @ ..] => {
                self.write(req)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Accept an UPDATE BINARY into the NDEF file. The two-byte length field
    /// is dropped; a write to it after data has been written starts a new
    /// file.
    fn write(&mut self, req: &[u8]) -> Result<(), NfcError> {
        let [o0, o1, size, data @ ..] = req else {
            return Err(NfcError::ShortWrite);
        };
        if data.len() != usize::from(*size) {
            return Err(NfcError::InvalidWriteSize);
        }
        let mut off = usize::from(u16::from_be_bytes([*o0, *o1]));
        let mut data = data;
        if off < EMPTY_FILE.len() {
            data = &data[(EMPTY_FILE.len() - off).min(data.len())..];
            off = 0;
            if self.next_write_off != 0 {
                tracing::debug!("New file after {} bytes", self.next_write_off);
                self.boundary = true;
            }
            self.next_write_off = 0;
        } else {
            off -= EMPTY_FILE.len();
        }
        if !data.is_empty() && off != self.next_write_off {
            return Err(NfcError::NonContiguousWrite {
                offset: off,
                expected: self.next_write_off,
            });
        }
        self.next_write_off = off + data.len();
        self.data.extend(data);
        Ok(())
    }
}

impl<D: Device> Read for Tag<D> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.boundary {
                self.boundary = false;
                return Ok(0);
            }
            if !self.data.is_empty() {
                let n = out.len().min(self.data.len());
                for (o, b) in out.iter_mut().zip(self.data.drain(..n)) {
                    *o = b;
                }
                return Ok(n);
            }
            let n = match self.dev.read(&mut self.buf) {
                Ok(0) => return Ok(0),
                Ok(n) => n,
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            };
            let (resp, deferred) = self.handle(n)?;
            if !resp.is_empty() {
                self.dev.write_all(&resp)?;
                self.dev.flush()?;
            }
            if let Some(e) = deferred {
                return Err(e.into());
            }
        }
    }
}
