//! Host side of the engraver protocol
//!
//! Every engraving runs the same session:
//!
//! 1. cancel anything in flight and initialize
//! 2. set pen delays
//! 3. home twice around a false home, then park at the safe point
//! 4. upload and run the plan at the configured speeds
//! 5. restore conservative speeds and park, also after a cancel

use std::iter;

use hammer_engrave::{Instruction, Point};
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf,
};
use tokio::sync::{oneshot, watch, Mutex};

use crate::config::Options;
use crate::error::{DriverError, Result};
use crate::protocol::*;
use crate::PARAMS;

/// Needle position clear of the plate fixture, in millimeters.
pub const SAFE_POINT_MM: (i32, i32) = (119, 43);

/// Offset for escaping a false limit switch home, in millimeters.
pub const FALSE_HOME_MM: i32 = 5;

const HOMING_SPEED: u16 = 300;
const SPEED_EXTRA: u16 = 0xe6;
const PEN_DELAY: u8 = 0x14;

pub fn safe_point() -> Point {
    Point::new(PARAMS.i(SAFE_POINT_MM.0), PARAMS.i(SAFE_POINT_MM.1))
}

enum Event {
    Cancel(bool),
    Read(std::io::Result<usize>),
}

/// Engraver session over a serial transport.
pub struct Driver<T> {
    reader: BufReader<ReadHalf<T>>,
    writer: Mutex<BufWriter<WriteHalf<T>>>,
    cancel: Option<oneshot::Receiver<()>>,
    progress: Option<watch::Sender<f32>>,
    cancelled: bool,
}

impl<T: AsyncRead + AsyncWrite> Driver<T> {
    pub fn new(dev: T) -> Self {
        let (r, w) = tokio::io::split(dev);
        Self {
            reader: BufReader::with_capacity(100, r),
            writer: Mutex::new(BufWriter::with_capacity(PROG_BATCH_SIZE * CMD_SIZE, w)),
            cancel: None,
            progress: None,
            cancelled: false,
        }
    }

    /// Abort the engraving when `cancel` fires.
    pub fn with_cancel(mut self, cancel: oneshot::Receiver<()>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Publish the fraction of the plan engraved so far.
    pub fn with_progress(mut self, progress: watch::Sender<f32>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Engrave the instructions produced by `plan`.
    ///
    /// `plan` is called twice: once to size the program and once to stream
    /// it. A cancelled engraving still parks the needle before returning
    /// [`DriverError::Cancelled`].
    pub async fn engrave<F, I>(&mut self, opts: &Options, plan: F) -> Result<()>
    where
        F: Fn() -> I,
        I: Iterator<Item = Instruction>,
    {
        opts.validate()?;
        let res = self.session(opts, plan).await;
        match res {
            Ok(()) | Err(DriverError::Cancelled) => {
                tracing::debug!("Parking needle");
                self.set_speeds(HOMING_SPEED, HOMING_SPEED).await?;
                match opts.end {
                    Some(end) => self.move_to(end.into()).await?,
                    None => {
                        self.move_to(safe_point()).await?;
                        self.origin().await?;
                    }
                }
                if self.cancelled {
                    tracing::info!("Engraving cancelled");
                    return Err(DriverError::Cancelled);
                }
                res
            }
            Err(e) => Err(e),
        }
    }

    async fn session<F, I>(&mut self, opts: &Options, plan: F) -> Result<()>
    where
        F: Fn() -> I,
        I: Iterator<Item = Instruction>,
    {
        self.initialize().await?;
        self.set_delays(PEN_DELAY, PEN_DELAY).await?;

        // The needle position is unknown at startup, and the first home may
        // be false.
        self.set_speeds(HOMING_SPEED, HOMING_SPEED).await?;
        self.origin().await?;
        let fh = PARAMS.i(FALSE_HOME_MM);
        self.move_to(Point::new(fh, fh)).await?;
        self.origin().await?;
        self.move_to(safe_point()).await?;
        tracing::debug!("Homed");

        self.set_speeds(opts.raw_print_speed(), opts.raw_move_speed())
            .await?;
        self.run_program(plan, true).await
    }

    async fn initialize(&mut self) -> Result<()> {
        self.write(&[CANCEL]).await?;
        self.write(&[INIT]).await?;
        loop {
            match self.read_status().await? {
                INITIALIZED => break,
                CANCELLED => self.write(&[INIT]).await?,
                s => tracing::debug!("Ignoring status {:#04x} during init", s),
            }
        }
        tracing::debug!("Engraver initialized");
        Ok(())
    }

    async fn set_speeds(&mut self, print: u16, mov: u16) -> Result<()> {
        let [p0, p1] = print.to_le_bytes();
        let [m0, m1] = mov.to_le_bytes();
        let [x0, x1] = SPEED_EXTRA.to_le_bytes();
        self.write(&[SET_SPEED, p0, p1, m0, m1, x0, x1]).await?;
        self.expect(&[SET_SPEED]).await
    }

    async fn set_delays(&mut self, pen_down: u8, pen_up: u8) -> Result<()> {
        self.write(&[SET_DELAYS, pen_down, pen_up]).await?;
        self.expect(&[SET_DELAYS]).await
    }

    async fn origin(&mut self) -> Result<()> {
        self.write(&[MOVE_TO_ORIGIN, MOVE_TO_ORIGIN_EXTRA]).await?;
        self.expect(&[MOVE_TO_ORIGIN, MOVE_TO_ORIGIN_RESPONSE]).await
    }

    async fn move_to(&mut self, p: Point) -> Result<()> {
        self.run_program(|| iter::once(Instruction::move_to(p)), false)
            .await
    }

    async fn run_program<F, I>(&mut self, plan: F, report: bool) -> Result<()>
    where
        F: Fn() -> I,
        I: Iterator<Item = Instruction>,
    {
        if report && self.cancelled {
            return Err(DriverError::Cancelled);
        }
        let count = plan().map(frame).count();
        let nbatches = batches(count);
        let nbatches = u16::try_from(nbatches).map_err(|_| DriverError::ProgramTooLarge(count))?;
        let padded = usize::from(nbatches) * PROG_BATCH_SIZE;
        if report {
            tracing::info!("Engraving {} instructions in {} batches", count, nbatches);
        }

        let [b0, b1] = nbatches.to_le_bytes();
        self.write(&[INIT_PROGRAM, b0, b1]).await?;

        let mut frames = plan().map(frame);
        let mut sent = 0;
        let mut steps = 0;
        loop {
            match self.read_status().await? {
                BUFFER_PROGRAM => {
                    if sent == padded {
                        continue;
                    }
                    let mut w = self.writer.lock().await;
                    for _ in 0..PROG_BATCH_SIZE {
                        let f = frames.next().unwrap_or(NOP_FRAME);
                        w.write_all(&f).await?;
                        sent += 1;
                    }
                    tracing::trace!("Sent batch, {}/{} frames", sent, padded);
                }
                PROGRAM_STEP => {
                    steps += 1;
                    if report {
                        self.report(steps, count);
                    }
                }
                PROGRAM_COMPLETE => break,
                CANCELLING => tracing::debug!("Engraver cancelling"),
                CANCELLED => return Err(DriverError::Cancelled),
                s => tracing::warn!("Unknown status {:#04x}", s),
            }
        }
        if report {
            tracing::info!("Program complete");
        }
        Ok(())
    }

    fn report(&self, steps: usize, count: usize) {
        if let Some(progress) = &self.progress {
            let p = if count == 0 {
                1.0
            } else {
                (steps as f32 / count as f32).min(1.0)
            };
            progress.send_replace(p);
        }
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        self.writer.lock().await.write_all(data).await?;
        Ok(())
    }

    /// Read the next status byte, injecting a cancel when the host asks for
    /// one.
    async fn read_status(&mut self) -> Result<u8> {
        self.writer.lock().await.flush().await?;
        let mut buf = [0u8; 1];
        loop {
            let ev = tokio::select! {
                biased;
                fired = wait_cancel(&mut self.cancel) => Event::Cancel(fired),
                n = self.reader.read(&mut buf) => Event::Read(n),
            };
            match ev {
                Event::Cancel(fired) => {
                    self.cancel = None;
                    if fired {
                        tracing::info!("Cancelling engraving");
                        self.cancelled = true;
                        let mut w = self.writer.lock().await;
                        w.write_all(&[CANCEL]).await?;
                        w.flush().await?;
                    }
                }
                Event::Read(n) => {
                    if n? == 0 {
                        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                    }
                    return Ok(buf[0]);
                }
            }
        }
    }

    async fn expect(&mut self, expected: &[u8]) -> Result<()> {
        for &want in expected {
            match self.read_status().await? {
                got if got == want => {}
                CANCELLING => {
                    self.drain_cancel().await?;
                    return Err(DriverError::Cancelled);
                }
                CANCELLED => return Err(DriverError::Cancelled),
                got => {
                    return Err(DriverError::UnexpectedReply {
                        expected: expected.to_vec(),
                        got,
                    })
                }
            }
        }
        Ok(())
    }

    /// Consume statuses up to the CANCELLED that ends a cancel, so the next
    /// command reads its own reply.
    async fn drain_cancel(&mut self) -> Result<()> {
        tracing::debug!("Engraver cancelling");
        loop {
            match self.read_status().await? {
                CANCELLED => return Ok(()),
                s => tracing::debug!("Ignoring status {:#04x} while cancelling", s),
            }
        }
    }
}

/// Resolves with `true` on a cancel request and `false` when the sender
/// went away; never resolves without a receiver.
async fn wait_cancel(cancel: &mut Option<oneshot::Receiver<()>>) -> bool {
    match cancel.as_mut() {
        Some(rx) => rx.await.is_ok(),
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Cmd, CmdType, Simulator};

    #[tokio::test]
    async fn empty_plan_homes_and_parks() {
        let mut sim = Simulator::new();
        Driver::new(&mut sim)
            .engrave(&Options::default(), iter::empty::<Instruction>)
            .await
            .unwrap();
        let sp = safe_point();
        let fh = PARAMS.i(FALSE_HOME_MM) as u32;
        let expected = vec![
            Cmd::move_to(0, 0),
            Cmd::move_to(fh, fh),
            Cmd::move_to(0, 0),
            Cmd::move_to(sp.x as u32, sp.y as u32),
            Cmd::move_to(sp.x as u32, sp.y as u32),
            Cmd::move_to(0, 0),
        ];
        assert_eq!(sim.cmds(), &expected[..]);
        assert!(sim.cmds().iter().all(|c| c.kind == CmdType::MoveTo));
    }

    #[tokio::test]
    async fn rejects_bad_options() {
        let mut sim = Simulator::new();
        let opts = Options {
            print_speed: -0.5,
            ..Options::default()
        };
        let err = Driver::new(&mut sim)
            .engrave(&opts, iter::empty::<Instruction>)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::InvalidOptions(_)));
        assert!(sim.cmds().is_empty());
    }

    #[tokio::test]
    async fn program_too_large() {
        let mut sim = Simulator::new();
        let plan = || iter::repeat(Instruction::line_to(Point::new(1, 1))).take(0xffff * PROG_BATCH_SIZE);
        let err = Driver::new(&mut sim)
            .engrave(&Options::default(), plan)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::ProgramTooLarge(_)));
    }

    #[tokio::test]
    async fn progress_reaches_one() {
        let mut sim = Simulator::new();
        let (tx, rx) = watch::channel(0.0f32);
        let plan = || (0..200).map(|i| Instruction::line_to(Point::new(i, i)));
        Driver::new(&mut sim)
            .with_progress(tx)
            .engrave(&Options::default(), plan)
            .await
            .unwrap();
        assert_eq!(*rx.borrow(), 1.0);
    }

    #[tokio::test]
    async fn dropped_cancel_sender_is_ignored() {
        let mut sim = Simulator::new();
        let (tx, rx) = oneshot::channel::<()>();
        drop(tx);
        let plan = || iter::once(Instruction::line_to(Point::new(10, 10)));
        Driver::new(&mut sim)
            .with_cancel(rx)
            .engrave(&Options::default(), plan)
            .await
            .unwrap();
        assert!(sim.cmds().contains(&Cmd::line_to(10, 10)));
    }
}
