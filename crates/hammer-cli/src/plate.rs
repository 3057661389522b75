//! `hammer engrave`: lay out one plate side and engrave or preview it

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use hammer_core::bip32::{self, ExtendedKey};
use hammer_core::{descriptor, Mnemonic, OutputDescriptor};
use hammer_engrave::backup::{self, title_string};
use hammer_engrave::measure::replay;
use hammer_engrave::{Command, PlateSize, Rasterizer, MONO};
use hammer_mjolnir::{serial, Driver, Options, PARAMS, STROKE_WIDTH};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};

use crate::commands::{EngraveArgs, Side};
use crate::error::UsageError;

/// Preview resolution.
const PIXELS_PER_MM: f32 = 24.0;

/// A laid out plate side.
pub struct Plate {
    pub key_idx: usize,
    pub size: PlateSize,
    pub side: Side,
    pub cmd: Command,
}

pub async fn engrave(args: &EngraveArgs, stdout: &mut dyn Write) -> anyhow::Result<()> {
    let plate = layout(args)?;
    tracing::info!(
        key = plate.key_idx,
        size = %plate.size,
        side = plate.side.name(),
        "Plate laid out"
    );
    match &args.device {
        Some(dev) => {
            let opts = driver_options(args)?;
            let port = serial::open(Some(dev)).with_context(|| format!("opening {dev}"))?;
            let (cancel_tx, cancel_rx) = oneshot::channel();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling engraving");
                    let _ = cancel_tx.send(());
                }
            });
            let res = engrave_on(port, &opts, &plate, args.dry_run, cancel_rx).await;
            interrupt.abort();
            res?;
            writeln!(stdout, "engraved plate {} side {}", plate.key_idx, plate.side.name())?;
        }
        None => {
            let file = preview(&plate, &args.output)?;
            writeln!(stdout, "{}", file.display())?;
        }
    }
    Ok(())
}

/// Parse the inputs and lay out the requested side.
pub fn layout(args: &EngraveArgs) -> anyhow::Result<Plate> {
    let mnemonic = Mnemonic::parse(args.mnemonic.trim())
        .with_context(|| format!("mnemonic {:?}", args.mnemonic))?;
    let mut desc = descriptor::parse(&args.descriptor).context("parsing descriptor")?;
    if desc.keys.is_empty() {
        return Err(UsageError::new("descriptor contains no keys").into());
    }
    desc.title = title_string(&MONO, &args.title);
    let key_idx = key_index(&mnemonic, &desc)?
        .ok_or_else(|| UsageError::new("seed is not among the descriptor keys"))?;

    let (size, cmd) = match args.side {
        Side::Front => {
            let seed = backup::Seed {
                title: desc.title.clone(),
                key_idx,
                mnemonic,
                keys: desc.keys.len(),
                master_fingerprint: desc.keys[key_idx].master_fingerprint,
                size: args.size.unwrap_or(PlateSize::Small),
            };
            match args.size {
                Some(size) => (size, backup::engrave_seed(&PARAMS, &seed)?),
                None => backup::fit_seed(&PARAMS, &seed)?,
            }
        }
        Side::Back => match args.size {
            Some(size) => {
                let plate = backup::Descriptor {
                    descriptor: desc,
                    key_idx,
                    size,
                };
                (size, backup::engrave_descriptor(&PARAMS, &plate)?)
            }
            None => backup::fit_descriptor(&PARAMS, &desc, key_idx)?,
        },
    };
    Ok(Plate {
        key_idx,
        size,
        side: args.side,
        cmd,
    })
}

/// Index of the descriptor key derived from `mnemonic`, if any.
pub fn key_index(mnemonic: &Mnemonic, desc: &OutputDescriptor) -> anyhow::Result<Option<usize>> {
    let network = desc.keys.first().map(|k| k.network).unwrap_or_default();
    let seed = mnemonic.seed("");
    let master = ExtendedKey::from_seed(&seed[..], network)?;
    for (i, k) in desc.keys.iter().enumerate() {
        // A failed derivation means the seed does not own this key.
        let Ok((_, xpub)) = bip32::derive(&master, &k.derivation_path) else {
            continue;
        };
        if k.extended_key().is_ok_and(|want| want == xpub) {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// Driver options from `--config` or the default options file, with
/// flags applied on top.
pub fn driver_options(args: &EngraveArgs) -> anyhow::Result<Options> {
    let path = args
        .config
        .clone()
        .or_else(|| Options::default_path().filter(|p| p.exists()));
    let mut opts = match path {
        Some(p) => Options::load(&p).with_context(|| format!("loading {}", p.display()))?,
        None => Options::default(),
    };
    if let Some(s) = args.move_speed {
        opts.move_speed = s;
    }
    if let Some(s) = args.print_speed {
        opts.print_speed = s;
    }
    opts.validate().map_err(|e| UsageError::new(e.to_string()))?;
    Ok(opts)
}

/// Run the plate through an engraver session on `dev`.
pub async fn engrave_on<T: AsyncRead + AsyncWrite>(
    dev: T,
    opts: &Options,
    plate: &Plate,
    dry_run: bool,
    cancel: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let cmd = if dry_run {
        Command::dry_run(plate.cmd.clone())
    } else {
        plate.cmd.clone()
    };
    let (progress_tx, mut progress_rx) = watch::channel(0.0f32);
    let reporter = tokio::spawn(async move {
        let mut reported = 0;
        while progress_rx.changed().await.is_ok() {
            let pct = (*progress_rx.borrow_and_update() * 100.0) as u32;
            if pct >= reported + 10 {
                tracing::info!("Engraved {}%", pct);
                reported = pct;
            }
        }
    });
    let mut driver = Driver::new(dev)
        .with_cancel(cancel)
        .with_progress(progress_tx);
    let res = driver.engrave(opts, || cmd.steps()).await;
    drop(driver);
    reporter.await.context("progress reporter")?;
    res.context("engraving")
}

/// Render the plate to `plate-<key>-side-<side>.png` in `dir`.
pub fn preview(plate: &Plate, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let bounds = plate.size.bounds().scale(PARAMS.millimeter);
    let mut r = Rasterizer::new(bounds, PIXELS_PER_MM / PARAMS.millimeter as f32, STROKE_WIDTH);
    replay(plate.cmd.steps(), &mut r);
    let file = dir.join(format!("plate-{}-side-{}.png", plate.key_idx, plate.side.name()));
    r.save_png(&file)
        .with_context(|| format!("writing {}", file.display()))?;
    tracing::debug!("Wrote {}", file.display());
    Ok(file)
}
