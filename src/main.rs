mod confirm;
mod extract;
mod util;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use paws::{BundleFile, BundleKind, BundleOptions, Encoding, ForceEncoding, ParseOptions};

use crate::confirm::{Always, ConfirmPolicy, Decision, Prompt};

#[derive(Parser)]
#[command(name = "paws", about = "Bundle files for an LLM (cats) and extract its reply (dogs)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle files and directories into a single text artifact
    Cats {
        /// Files or directories to include (relative to --base)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output bundle path, or "-" for stdout
        #[arg(long, short, default_value = "cats.md")]
        output: PathBuf,
        /// Exclude a relative path, directory prefix or path component (repeatable)
        #[arg(long, short = 'x')]
        exclude: Vec<String>,
        /// File whose text is prepended as the persona
        #[arg(long, short)]
        persona: Option<PathBuf>,
        /// File whose text is prepended as the system prompt
        #[arg(long, short)]
        system_prompt: Option<PathBuf>,
        /// Encoding policy for file bodies
        #[arg(long, short = 'E', value_enum, default_value_t = BundleEncoding::Auto)]
        encoding: BundleEncoding,
        /// Mark the bundle as a reference for later delta extraction
        #[arg(long, short = 't')]
        prepare_for_delta: bool,
        /// Emit a dogs-style bundle (🐕 markers) instead of cats
        #[arg(long)]
        dogs: bool,
        /// Directory paths in the bundle are relative to
        #[arg(long, short = 'C', default_value = ".")]
        base: PathBuf,
    },
    /// Extract files from a bundle into a directory
    Dogs {
        /// Bundle to read, or "-" for stdin
        #[arg(default_value = "dogs.md")]
        bundle: PathBuf,
        /// Directory to extract into
        #[arg(default_value = ".")]
        output_dir: PathBuf,
        /// Reference bundle; enables delta commands
        #[arg(long, short = 'd')]
        apply_delta: Option<PathBuf>,
        /// Override the encoding of every block
        #[arg(long, short = 'i', value_enum, default_value_t = InputFormat::Auto)]
        input_format: InputFormat,
        /// Overwrite and delete without asking
        #[arg(long, short = 'y', conflicts_with = "no")]
        yes: bool,
        /// Never touch existing files
        #[arg(long, short = 'n')]
        no: bool,
        /// Report what would happen without writing
        #[arg(long)]
        dry_run: bool,
        /// Write a JSON report of the extraction
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BundleEncoding {
    Auto,
    Base64,
}

impl From<BundleEncoding> for ForceEncoding {
    fn from(value: BundleEncoding) -> Self {
        match value {
            BundleEncoding::Auto => ForceEncoding::Auto,
            BundleEncoding::Base64 => ForceEncoding::Base64,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    Auto,
    Utf8,
    Utf16le,
    Base64,
}

impl InputFormat {
    fn forced(self) -> Option<Encoding> {
        match self {
            InputFormat::Auto => None,
            InputFormat::Utf8 => Some(Encoding::Utf8),
            InputFormat::Utf16le => Some(Encoding::Utf16Le),
            InputFormat::Base64 => Some(Encoding::Base64),
        }
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

async fn read_text(path: &Path) -> Result<String> {
    if is_stdio(path) {
        return tokio::task::spawn_blocking(|| -> Result<String> {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read bundle from stdin")?;
            Ok(buffer)
        })
        .await?;
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read: {}", path.display()))
}

async fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) => read_text(path).await.map(Some),
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Cats {
            inputs,
            output,
            exclude,
            persona,
            system_prompt,
            encoding,
            prepare_for_delta,
            dogs,
            base,
        } => {
            let to_stdout = is_stdio(&output);
            let start = Instant::now();

            let (persona, system_prompt) = tokio::try_join!(
                read_optional(persona.as_deref()),
                read_optional(system_prompt.as_deref()),
            )?;

            let files = tokio::task::spawn_blocking(move || -> Result<Vec<BundleFile>> {
                let entries = util::collect_files(&inputs, &base, &exclude)?;
                entries
                    .par_iter()
                    .map(|e| -> Result<BundleFile> {
                        let bytes = util::read_file(&e.full_path, e.size)?;
                        Ok(BundleFile::new(e.relative_path.clone(), bytes))
                    })
                    .collect()
            })
            .await??;

            let (files, unframeable): (Vec<BundleFile>, Vec<BundleFile>) = files
                .into_iter()
                .partition(|f| paws::check_bundle_path(&f.path).is_ok());
            for file in &unframeable {
                eprintln!("  skipped: {:?} cannot be named in a bundle marker", file.path);
            }

            let options = BundleOptions {
                kind: if dogs { BundleKind::Dogs } else { BundleKind::Cats },
                force_encoding: encoding.into(),
                delta_reference: prepare_for_delta,
                persona,
                system_prompt,
            };
            let bundle = paws::create_bundle(&files, &options);
            let binaries = files.iter().filter(|f| f.is_binary).count();

            if to_stdout {
                print!("{bundle}");
                eprintln!(
                    "Bundled {} file(s) ({binaries} binary) in {:.3}s",
                    files.len(),
                    start.elapsed().as_secs_f64()
                );
            } else {
                tokio::fs::write(&output, &bundle)
                    .await
                    .with_context(|| format!("Failed to write bundle: {}", output.display()))?;
                println!("Bundle created successfully!");
                println!("  Output: {}", output.display());
                println!("  Files: {}", files.len());
                println!("  Binary files: {binaries}");
                println!("  Skipped files: {}", unframeable.len());
                println!("  Size: {} bytes", bundle.len());
                println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());
            }
        }
        Commands::Dogs {
            bundle,
            output_dir,
            apply_delta,
            input_format,
            yes,
            no,
            dry_run,
            report,
        } => {
            if is_stdio(&bundle) && !yes && !no {
                bail!("Reading the bundle from stdin needs -y or -n (stdin cannot also answer prompts)");
            }

            println!("Extracting bundle...");
            println!("  Bundle: {}", bundle.display());
            println!("  Output: {}", output_dir.display());
            if let Some(reference) = &apply_delta {
                println!("  Reference: {}", reference.display());
            }

            let start = Instant::now();
            let (bundle_text, reference_text) =
                tokio::try_join!(read_text(&bundle), read_optional(apply_delta.as_deref()))?;

            let options = ParseOptions {
                apply_delta: reference_text.is_some(),
                forced_encoding: input_format.forced(),
            };
            let (header, results) = tokio::task::spawn_blocking(move || {
                let parsed = paws::parse_bundle(&bundle_text, &options);
                let files = match reference_text {
                    Some(reference) => paws::resolve_deltas(parsed.files, &reference),
                    None => parsed.files,
                };
                (parsed.header, files)
            })
            .await?;

            if let Some(format) = &header.format {
                log::info!("bundle format: {format}");
            }
            if header.delta_reference {
                log::warn!("this bundle is marked as a delta reference, not an LLM reply");
            }

            let mut policy: Box<dyn ConfirmPolicy + Send> = if yes {
                Box::new(Always(Decision::WriteAll))
            } else if no {
                Box::new(Always(Decision::SkipAll))
            } else {
                Box::new(Prompt::new(BufReader::new(std::io::stdin()), std::io::stderr()))
            };

            let summary = tokio::task::spawn_blocking(move || {
                extract::extract_files(results, &output_dir, dry_run, policy.as_mut())
            })
            .await??;

            for note in &summary.warnings {
                println!("  warning: {}: {}", note.path, note.message);
            }
            for note in &summary.failed {
                println!("  failed: {}: {}", note.path, note.message);
            }

            println!("\nExtraction finished{}", if dry_run { " (dry run)" } else { "" });
            println!("  Files written: {}", summary.written.len());
            println!("  Files deleted: {}", summary.deleted.len());
            println!("  Files unchanged: {}", summary.unchanged.len());
            println!("  Files skipped: {}", summary.skipped.len());
            println!("  Files failed: {}", summary.failed.len());
            println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());

            if let Some(path) = &report {
                let json = serde_json::to_string_pretty(&summary).context("Failed to serialize report")?;
                tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("Failed to write report: {}", path.display()))?;
            }

            if summary.aborted {
                bail!("Extraction aborted");
            }
            if !summary.failed.is_empty() {
                bail!("{} file(s) could not be extracted", summary.failed.len());
            }
        }
    }

    Ok(())
}
