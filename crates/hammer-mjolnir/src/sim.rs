//! In-process engraver for driving the protocol without hardware
//!
//! The simulator validates frame sizes against its state machine and records
//! every needle movement. Each read yields to the runtime once before
//! answering, so cancel requests and progress observers get a chance to run
//! between status bytes.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::protocol::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdType {
    MoveTo,
    LineTo,
}

/// A recorded needle movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cmd {
    pub kind: CmdType,
    pub x: u32,
    pub y: u32,
}

impl Cmd {
    pub const fn move_to(x: u32, y: u32) -> Self {
        Self {
            kind: CmdType::MoveTo,
            x,
            y,
        }
    }

    pub const fn line_to(x: u32, y: u32) -> Self {
        Self {
            kind: CmdType::LineTo,
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Initializing,
    SetSpeed,
    SetDelays,
    MoveToOrigin,
    Executing,
    Cancelling,
}

#[derive(Debug)]
pub struct Simulator {
    state: State,
    pending: Vec<u8>,
    /// Program frames still expected
    ncmds: usize,
    /// Frames received but not yet stepped through
    nbuffered: usize,
    /// Frames received since the last buffer request
    batch: usize,
    yielded: bool,
    cmds: Vec<Cmd>,
    programs: Vec<usize>,
    bytes: Vec<usize>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            state: State::Ready,
            pending: Vec::new(),
            ncmds: 0,
            nbuffered: 0,
            batch: 0,
            yielded: false,
            cmds: Vec::new(),
            programs: Vec::new(),
            bytes: Vec::new(),
        }
    }

    /// Every movement the needle made, homing included.
    pub fn cmds(&self) -> &[Cmd] {
        &self.cmds
    }

    /// Frames received by each program, in order.
    pub fn frames_per_program(&self) -> &[usize] {
        &self.programs
    }

    /// Bytes received while each program was executing.
    pub fn bytes_per_program(&self) -> &[usize] {
        &self.bytes
    }

    fn status(&mut self) -> io::Result<Vec<u8>> {
        let resp = match self.state {
            State::Initializing => {
                self.state = State::Ready;
                vec![INITIALIZED]
            }
            State::SetSpeed => {
                self.state = State::Ready;
                vec![SET_SPEED]
            }
            State::SetDelays => {
                self.state = State::Ready;
                vec![SET_DELAYS]
            }
            State::MoveToOrigin => {
                self.state = State::Ready;
                vec![MOVE_TO_ORIGIN, MOVE_TO_ORIGIN_RESPONSE]
            }
            State::Cancelling => {
                self.state = State::Ready;
                vec![CANCELLED]
            }
            State::Executing => {
                if self.batch != 0 && self.batch != PROG_BATCH_SIZE {
                    return Err(invalid(format!("partial batch of {} frames", self.batch)));
                }
                self.batch = 0;
                if self.nbuffered > 0 {
                    self.nbuffered -= 1;
                    vec![PROGRAM_STEP]
                } else if self.ncmds > 0 {
                    vec![BUFFER_PROGRAM]
                } else {
                    self.state = State::Ready;
                    vec![PROGRAM_COMPLETE]
                }
            }
            State::Ready => return Err(invalid("invalid device state")),
        };
        Ok(resp)
    }

    /// Consume complete frames from the pending buffer.
    fn process(&mut self) -> io::Result<()> {
        loop {
            let Some(&op) = self.pending.first() else {
                return Ok(());
            };
            let len = self.frame_len(op)?;
            if self.pending.len() < len {
                return Ok(());
            }
            let frame: Vec<u8> = self.pending.drain(..len).collect();
            self.execute(&frame)?;
        }
    }

    fn frame_len(&self, op: u8) -> io::Result<usize> {
        let len = match self.state {
            State::Executing => match op {
                CANCEL => 1,
                MOVE | LINE | NOP => CMD_SIZE,
                _ => return Err(invalid(format!("invalid program frame {op:#04x}"))),
            },
            // Everything but a cancel is swallowed while cancelling.
            State::Cancelling => 1,
            _ => match op {
                CANCEL | INIT => 1,
                SET_SPEED => 7,
                SET_DELAYS => 3,
                MOVE_TO_ORIGIN => 2,
                INIT_PROGRAM => 3,
                _ => return Err(invalid(format!("invalid command {op:#04x}"))),
            },
        };
        Ok(len)
    }

    fn execute(&mut self, frame: &[u8]) -> io::Result<()> {
        match self.state {
            State::Cancelling => {}
            State::Executing => {
                if let Some(b) = self.bytes.last_mut() {
                    *b += frame.len();
                }
                if frame[0] == CANCEL {
                    self.state = State::Cancelling;
                    return Ok(());
                }
                if self.ncmds == 0 {
                    return Err(invalid("program overflow"));
                }
                self.ncmds -= 1;
                self.nbuffered += 1;
                self.batch += 1;
                if let Some(n) = self.programs.last_mut() {
                    *n += 1;
                }
                let (x, y) = parse_coords(&frame[1..]);
                match frame[0] {
                    MOVE => self.cmds.push(Cmd::move_to(x, y)),
                    LINE => self.cmds.push(Cmd::line_to(x, y)),
                    _ => {}
                }
            }
            _ => match frame[0] {
                CANCEL => {}
                INIT => self.state = State::Initializing,
                SET_SPEED => self.state = State::SetSpeed,
                SET_DELAYS => self.state = State::SetDelays,
                MOVE_TO_ORIGIN => {
                    if frame[1] != MOVE_TO_ORIGIN_EXTRA {
                        return Err(invalid("invalid origin command"));
                    }
                    self.state = State::MoveToOrigin;
                    self.cmds.push(Cmd::move_to(0, 0));
                }
                INIT_PROGRAM => {
                    let nbatches = usize::from(u16::from_le_bytes([frame[1], frame[2]]));
                    self.state = State::Executing;
                    self.ncmds = nbatches * PROG_BATCH_SIZE;
                    self.nbuffered = 0;
                    self.batch = 0;
                    self.programs.push(0);
                    self.bytes.push(0);
                }
                op => return Err(invalid(format!("invalid command {op:#04x}"))),
            },
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

impl AsyncRead for Simulator {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.yielded {
            this.yielded = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        this.yielded = false;
        let resp = this.status()?;
        if resp.len() > buf.remaining() {
            return Poll::Ready(Err(invalid("read overflow")));
        }
        buf.put_slice(&resp);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for Simulator {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.pending.extend_from_slice(data);
        this.process()?;
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
