//! Command-line surface

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hammer_engrave::PlateSize;

use crate::{firmware, plate, seed};

const DEFAULT_MNEMONIC: &str =
    "vocal tray giggle tool duck letter category pattern train magnet excite swamp";
const DEFAULT_DESCRIPTOR: &str = "wpkh([97a6d3c2/84h/1h/0h]tpubDD5cTgxiP4qYJgBgkS6arjQH3GsJEHExFZWvumhNGGe4gBShn9u3b4TdpG2DvRg3knNXV7fBdmaw6cH2kKYdk2aXjQZYsnTchA4aFsZWehG)";
const DEFAULT_TITLE: &str = "Satoshi's Nice Stash";

/// Hammer - seed tools and backup plate engraving
#[derive(Parser, Debug)]
#[command(name = "hammer")]
#[command(about = "Seed tools, backup plate engraving and firmware signing", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode entropy read from standard input as a codex32 string
    Seed {
        /// Threshold number of shares, 1 for an unshared secret
        #[arg(long, default_value_t = 1)]
        threshold: u8,

        /// 4-character bech32 identifier
        #[arg(long)]
        id: String,

        /// Seed length in bytes (16-64)
        #[arg(long, default_value_t = 32)]
        seedlen: usize,

        /// Share index ('A', 'C', 'D', ...) or 'S'
        #[arg(long, default_value = "S")]
        idx: String,

        /// Human-readable prefix
        #[arg(long, default_value = "ms")]
        hrp: String,
    },

    /// Interpolate codex32 shares read from standard input, one per line
    Interpolate {
        /// Share index to derive; 'S' recovers the secret
        #[arg(long, default_value = "S")]
        idx: String,
    },

    /// Derive keys from an extended key, codex32 shares or a mnemonic
    /// read from standard input
    Derive {
        /// Output format
        #[arg(value_enum)]
        format: seed::Format,

        /// Derivation path (e.g. 'm/84h/0h/0h')
        #[arg(long, default_value = "m")]
        path: String,

        /// Use testnet versions for seeds and mnemonics
        #[arg(long)]
        testnet: bool,

        /// BIP-39 passphrase for mnemonic input
        #[arg(long, default_value = "")]
        passphrase: String,
    },

    /// Write random bytes to standard output
    Rand {
        /// Number of bytes (at least 16)
        #[arg(short = 'n', default_value_t = 32)]
        n: usize,
    },

    /// Engrave one side of a backup plate, or render a PNG preview
    Engrave(EngraveArgs),

    /// Firmware image signing
    #[command(subcommand)]
    Firmware(FirmwareCommands),
}

/// Plate side to engrave.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Seed words and SeedQR
    Front,
    /// Output descriptor shares
    Back,
}

impl Side {
    pub fn name(self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct EngraveArgs {
    /// Seed phrase
    #[arg(long, default_value = DEFAULT_MNEMONIC)]
    pub mnemonic: String,

    /// Output descriptor holding a key of the seed
    #[arg(long, default_value = DEFAULT_DESCRIPTOR)]
    pub descriptor: String,

    /// Wallet title
    #[arg(long, default_value = DEFAULT_TITLE)]
    pub title: String,

    #[arg(long, value_enum, default_value_t = Side::Front)]
    pub side: Side,

    /// Plate size (small, square, large); the smallest that fits by default
    #[arg(long)]
    pub size: Option<PlateSize>,

    /// Serial device of the engraver; renders PNG previews when absent
    #[arg(long)]
    pub device: Option<String>,

    /// Directory for PNG previews
    #[arg(short, long, default_value = "plates")]
    pub output: PathBuf,

    /// Move the needle along the plan without engraving
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Driver options file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Needle-up speed in [0,1], overriding the options file
    #[arg(long)]
    pub move_speed: Option<f32>,

    /// Engraving speed in [0,1], overriding the options file
    #[arg(long)]
    pub print_speed: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum FirmwareCommands {
    /// Print the digest covered by the image signature
    Hash {
        image: PathBuf,

        /// Load address of the image
        #[arg(long, default_value_t = hammer_picobin::FLASH_BASE, value_parser = firmware::parse_address)]
        address: u32,
    },

    /// Replace the public key and signature of an image
    Sign {
        image: PathBuf,

        /// Uncompressed public key coordinates, 64 bytes in hex
        #[arg(long)]
        pubkey: String,

        /// Signature, 64 bytes in hex
        #[arg(long)]
        signature: String,

        /// Output image
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the public key and signature of an image
    Extract { image: PathBuf },
}

/// Run `cli` against the given standard input and output.
pub async fn run(cli: Cli, stdin: &mut dyn Read, stdout: &mut dyn Write) -> anyhow::Result<()> {
    match cli.command {
        Commands::Seed {
            threshold,
            id,
            seedlen,
            idx,
            hrp,
        } => {
            let conf = seed::SeedConf::new(&hrp, threshold, &id, seedlen, &idx)?;
            seed::gen_seed(&conf, stdin, stdout)
        }
        Commands::Interpolate { idx } => seed::interpolate(&idx, stdin, stdout),
        Commands::Derive {
            format,
            path,
            testnet,
            passphrase,
        } => seed::derive(format, &path, testnet, &passphrase, stdin, stdout),
        Commands::Rand { n } => seed::gen_rand(n, stdout),
        Commands::Engrave(args) => plate::engrave(&args, stdout).await,
        Commands::Firmware(cmd) => firmware::run(cmd, stdout),
    }
}
