use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bincode2::{deserialize, serialize};
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use rolling_window_diff::delta_generation::{generate_delta, Delta};
use rolling_window_diff::patch::patch;
use rolling_window_diff::rolling_checksum::adler32::{full_checksum, WindowState};
use rolling_window_diff::rolling_checksum::RollingChecksum;
use rolling_window_diff::signature_generation::generate_signature;
use rolling_window_diff::strong_hash::md5::Md5Sum;
use rolling_window_diff::strong_hash::StrongHash;
use rolling_window_diff::Signature;

type FileSignature =
    Signature<<WindowState as RollingChecksum>::ChecksumType, <Md5Sum as StrongHash>::HashType>;

#[derive(Parser, Debug)]
#[clap(version, about)]
/// Rolling checksum based signature, delta and patch generation in the spirit of rdiff
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generates a signature of --old-file=<OLD_FILE> into --signature-file=<SIGNATURE_FILE> to be later used as a source for the "delta" command
    Signature {
        #[clap(long)]
        /// The source file of the signature
        old_file: PathBuf,
        #[clap(long)]
        /// The resulting signature file
        signature_file: PathBuf,
        #[clap(long)]
        /// Size of the blocks the old file is split into, picked from the file size when omitted
        block_size: Option<usize>,
    },
    /// Generates the delta between a file described by --signature-file=<SIGNATURE_FILE> and a --new-file=<NEW_FILE> to --delta-file=<DELTA_FILE>
    Delta {
        #[clap(long)]
        /// The signature file describing the original content
        signature_file: PathBuf,
        #[clap(long)]
        /// The file with the (potentially) updated content
        new_file: PathBuf,
        #[clap(long)]
        /// The resulting delta file
        delta_file: PathBuf,
    },
    /// Applies --delta-file=<DELTA_FILE> on top of --old-file=<OLD_FILE> (not in place) and produces --updated_file<UPDATED_FILE>
    Patch {
        #[clap(long)]
        /// The delta file to apply
        delta_file: PathBuf,
        #[clap(long)]
        /// The file the delta is going to be applied on
        old_file: PathBuf,
        #[clap(long)]
        /// The file with the (potentially) updated content
        updated_file: PathBuf,
    },
    /// Prints the weak checksum of --file=<FILE>, or of its last --window=<WINDOW> bytes computed by rolling over the whole file
    Checksum {
        #[clap(long)]
        /// The file to checksum
        file: PathBuf,
        #[clap(long)]
        /// Width of the rolling window
        window: Option<usize>,
    },
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut content = Vec::<u8>::new();
    file.read_to_end(&mut content)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(content)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli: Cli = Cli::parse();

    match cli.command {
        Commands::Signature {
            old_file,
            signature_file,
            block_size,
        } => {
            info!(
                "Generating signature of {} into {}",
                old_file.display(),
                signature_file.display()
            );

            let old_file_content = read_file(&old_file)?;
            let signature =
                generate_signature::<WindowState, Md5Sum>(&old_file_content, block_size);

            File::create(&signature_file)
                .with_context(|| format!("creating {}", signature_file.display()))?
                .write_all(serialize(&signature)?.as_slice())?;

            // read the signature back to make sure it survived serialization
            let written: FileSignature = deserialize(read_file(&signature_file)?.as_slice())
                .with_context(|| format!("decoding {}", signature_file.display()))?;
            if !signature.block_count_matches(&written) {
                bail!(
                    "signature {} does not match the generated one after decoding",
                    signature_file.display()
                );
            }
            info!(
                "Signature of {} chunks of {} bytes written",
                signature.chunk_count(),
                signature.chunk_size()
            );
            Ok(())
        }
        Commands::Delta {
            signature_file,
            new_file,
            delta_file,
        } => {
            info!(
                "Generating the delta between {} and {} into {}",
                signature_file.display(),
                new_file.display(),
                delta_file.display(),
            );

            let signature: FileSignature = deserialize(read_file(&signature_file)?.as_slice())
                .with_context(|| format!("decoding {}", signature_file.display()))?;
            let new_file_content = read_file(&new_file)?;

            let delta =
                generate_delta::<WindowState, Md5Sum>(&signature, new_file_content.as_slice())?;

            File::create(&delta_file)
                .with_context(|| format!("creating {}", delta_file.display()))?
                .write_all(serialize(&delta)?.as_slice())?;
            Ok(())
        }
        Commands::Patch {
            delta_file,
            old_file,
            updated_file,
        } => {
            info!(
                "Applying delta {} on top of {} into {}",
                delta_file.display(),
                old_file.display(),
                updated_file.display(),
            );

            let old_file_content = read_file(&old_file)?;
            let delta: Delta<<Md5Sum as StrongHash>::HashType> =
                deserialize(read_file(&delta_file)?.as_slice())
                    .with_context(|| format!("decoding {}", delta_file.display()))?;
            let out_file = File::create(&updated_file)
                .with_context(|| format!("creating {}", updated_file.display()))?;

            patch::<Md5Sum, BufWriter<File>>(
                old_file_content.as_slice(),
                delta,
                &mut BufWriter::new(out_file),
            )?;
            Ok(())
        }
        Commands::Checksum { file, window } => {
            let content = read_file(&file)?;
            let window = window.unwrap_or(content.len()).min(content.len());

            let (mut checksum, mut state) = full_checksum(&content[..window]);
            debug!("window at offset 0: {:#010x}", checksum);
            if window > 0 {
                for (offset, &byte) in content[window..].iter().enumerate() {
                    checksum = state.slide_by(byte)?;
                    debug!("window at offset {}: {:#010x}", offset + 1, checksum);
                }
            }

            println!("{:#010x}  {}", checksum, file.display());
            Ok(())
        }
    }
}
