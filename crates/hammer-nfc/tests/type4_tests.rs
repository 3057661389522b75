//! Type 4 tag emulation against scripted writer transcripts

use std::io::{self, Read, Write};

use hammer_nfc::type4::*;
use hammer_nfc::{Device, Record, RecordReader, Tag};

// ============================================================================
// Scripted writer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Reading,
    Sleeping,
    Responding,
    Complete,
}

#[derive(Debug)]
struct Message {
    step: Step,
    msg: Vec<u8>,
    resp: Vec<u8>,
    sleep: bool,
}

/// Plays the writer side of a transcript, failing on any deviation.
#[derive(Default)]
struct Writer {
    msgs: Vec<Message>,
    idx: usize,
    block_no: u8,
}

impl Writer {
    fn push(&mut self, msg: Vec<u8>, resp: Vec<u8>, sleep: bool) {
        self.msgs.push(Message {
            step: Step::Reading,
            msg,
            resp,
            sleep,
        });
    }

    fn sens_req(&mut self) {
        self.push(vec![SENS_REQ, 0x80], ATS.to_vec(), false);
    }

    fn sleep_req(&mut self) {
        self.push(SLP_REQ.to_vec(), vec![], true);
    }

    fn deselect(&mut self) {
        self.push(vec![DESELECT], vec![DESELECT], true);
    }

    fn nak(&mut self) {
        let b = self.block_no;
        self.push(vec![R_NAK | b], vec![R_ACK | (1 - b)], false);
    }

    fn isodep(&mut self, msg: &[u8], resp: &[u8]) {
        let pcb = I_BLOCK | self.block_no;
        let mut m = vec![pcb, CLA];
        m.extend_from_slice(msg);
        let mut r = vec![pcb];
        r.extend_from_slice(resp);
        self.push(m, r, false);
        self.block_no = 1 - self.block_no;
    }

    fn select_ndef(&mut self) {
        self.isodep(&TAG_SELECT, &ACK);
    }

    fn select_cc(&mut self) {
        self.isodep(&CC_SELECT, &ACK);
    }

    fn read_cc(&mut self) {
        let mut resp = CAP_CONTAINER.to_vec();
        resp.extend_from_slice(&ACK);
        self.isodep(&[READ, 0, 0, 15], &resp);
    }

    fn select_file(&mut self) {
        self.isodep(&FILE_SELECT, &ACK);
    }

    fn write_chunk(&mut self, off: u16, data: &[u8], resp: &[u8]) {
        let mut req = vec![WRITE];
        req.extend_from_slice(&off.to_be_bytes());
        req.push(data.len() as u8);
        req.extend_from_slice(data);
        self.isodep(&req, resp);
    }

    fn write_file(&mut self, f: &[u8]) {
        self.write_chunk(0, &(f.len() as u16).to_be_bytes(), &ACK);
        let mut off = 2u16;
        for chunk in f.chunks(CHUNK_SIZE) {
            self.write_chunk(off, chunk, &ACK);
            off += chunk.len() as u16;
        }
    }

    fn current(&mut self, want: Step, what: &str) -> &mut Message {
        assert!(self.idx < self.msgs.len(), "unexpected {what}");
        let m = &mut self.msgs[self.idx];
        assert_eq!(m.step, want, "unexpected {what} at message {}", self.idx);
        m
    }
}

impl Read for Writer {
    fn read(&mut self, b: &mut [u8]) -> io::Result<usize> {
        if self.idx == self.msgs.len() {
            return Ok(0);
        }
        let m = self.current(Step::Reading, "read");
        let n = m.msg.len();
        b[..n].copy_from_slice(&m.msg);
        m.step = match (m.resp.is_empty(), m.sleep) {
            (true, false) => Step::Complete,
            (false, false) => Step::Responding,
            (_, true) => Step::Sleeping,
        };
        if m.step == Step::Complete {
            self.idx += 1;
        }
        Ok(n)
    }
}

impl Write for Writer {
    fn write(&mut self, b: &[u8]) -> io::Result<usize> {
        let m = self.current(Step::Responding, "write");
        assert_eq!(b, &m.resp[..], "unexpected response");
        m.step = Step::Complete;
        self.idx += 1;
        Ok(b.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Device for Writer {
    fn sleep(&mut self) -> io::Result<()> {
        let m = self.current(Step::Sleeping, "sleep");
        if m.resp.is_empty() {
            m.step = Step::Complete;
            self.idx += 1;
        } else {
            m.step = Step::Responding;
        }
        Ok(())
    }
}

/// Read one file, up to the next boundary.
fn read_file(tag: &mut Tag<Writer>) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 100];
    loop {
        let n = tag.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

fn handshake(w: &mut Writer) {
    w.sens_req();
    w.select_ndef();
    w.select_cc();
    w.read_cc();
    w.select_file();
}

// ============================================================================
// Transcripts
// ============================================================================

#[test]
fn writes_files() {
    let mut w = Writer::default();
    w.sleep_req();
    w.sens_req();
    w.deselect();
    w.sens_req();
    w.nak();
    w.select_ndef();
    w.select_cc();
    w.read_cc();
    w.select_file();
    let files = [vec![1u8, 2, 3, 4], [5u8, 4, 0, 0].repeat(100)];
    for f in &files {
        w.write_file(f);
    }

    let mut tag = Tag::new(w);
    // Sleep and deselect both end the stream.
    for _ in 0..2 {
        assert!(read_file(&mut tag).unwrap().is_empty());
    }
    for f in &files {
        assert_eq!(&read_file(&mut tag).unwrap(), f);
    }
    let w = tag.into_inner();
    assert_eq!(w.idx, w.msgs.len());
}

#[test]
fn repeated_sens_req() {
    let mut w = Writer::default();
    w.sens_req();
    w.sens_req();
    let mut tag = Tag::new(w);
    assert_eq!(tag.read(&mut [0u8; 100]).unwrap(), 0);
}

#[test]
fn nak_with_current_block_is_ignored() {
    let mut w = Writer::default();
    w.sens_req();
    // The tag's block number is 1 after activation.
    w.push(vec![R_NAK | 1], vec![], false);
    w.select_ndef();
    let mut tag = Tag::new(w);
    assert_eq!(tag.read(&mut [0u8; 16]).unwrap(), 0);
}

#[test]
fn select_requires_ndef_application() {
    let mut w = Writer::default();
    w.sens_req();
    w.isodep(&CC_SELECT, &NAK);
    w.isodep(&[0xa4, 0x00, 0x00, 0x00], &NAK);
    let mut tag = Tag::new(w);
    assert_eq!(tag.read(&mut [0u8; 16]).unwrap(), 0);
}

#[test]
fn read_past_file_is_rejected() {
    let mut w = Writer::default();
    handshake(&mut w);
    w.isodep(&[READ, 0, 0, 2], &[0, 0, 0x90, 0x00]);
    w.isodep(&[READ, 0, 1, 2], &NAK);
    let mut tag = Tag::new(w);
    assert_eq!(tag.read(&mut [0u8; 16]).unwrap(), 0);
}

#[test]
fn random_order_write_fails() {
    let mut w = Writer::default();
    handshake(&mut w);
    w.write_chunk(0, &[0, 8], &ACK);
    w.write_chunk(6, &[1, 2, 3, 4], &NAK);
    let mut tag = Tag::new(w);
    let err = tag.read(&mut [0u8; 16]).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[test]
fn malformed_write_fails() {
    let mut w = Writer::default();
    handshake(&mut w);
    // Declares 4 bytes, carries 2.
    w.isodep(&[WRITE, 0, 2, 4, 1, 2], &NAK);
    let mut tag = Tag::new(w);
    assert!(tag.read(&mut [0u8; 16]).is_err());
}

#[test]
fn text_record_through_tag() {
    let message =
        hex::decode("91010f5402656e48656c6c6f20776f726c642151010c55046578616d706c652e636f6d")
            .unwrap();
    let mut w = Writer::default();
    handshake(&mut w);
    w.write_file(&message);
    let mut tag = Tag::new(w);
    let records: Vec<Record> = RecordReader::new(&mut tag)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        records,
        [
            Record::Text("Hello world!".into()),
            Record::Uri("https://example.com".into())
        ]
    );
}
