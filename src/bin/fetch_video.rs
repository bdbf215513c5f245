#![forbid(unsafe_code)]

//! Command-line front end: resolves a video reference and downloads the best
//! available stream, printing progress percentages as they arrive.

use anyhow::{Context, Result, bail};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::thread;

use tubepull::config::{RuntimeOverrides, resolve_runtime_settings};
use tubepull::diag::{DiagnosticSink, NullSink, StderrSink};
use tubepull::download::DownloadEngine;
use tubepull::extract::extract_video_id;
use tubepull::progress::progress_channel;
use tubepull::resolver::MetadataFetcher;
use tubepull::security::ensure_not_root;
use tubepull::transport::Transport;
use tubepull::{StreamCatalog, parse_stream_catalog};

#[derive(Debug, Clone)]
struct FetchArgs {
    reference: String,
    dest: Option<PathBuf>,
    proxy: Option<String>,
    env_path: Option<PathBuf>,
    quiet: bool,
}

impl FetchArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut reference: Option<String> = None;
        let mut dest: Option<PathBuf> = None;
        let mut proxy: Option<String> = None;
        let mut env_path: Option<PathBuf> = None;
        let mut quiet = false;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--dest=") {
                dest = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--proxy=") {
                proxy = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--env=") {
                env_path = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--dest" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--dest requires a value"))?;
                    dest = Some(PathBuf::from(value));
                }
                "--proxy" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--proxy requires a value"))?;
                    proxy = Some(value);
                }
                "--env" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--env requires a value"))?;
                    env_path = Some(PathBuf::from(value));
                }
                "--quiet" => {
                    quiet = true;
                }
                _ if arg.starts_with('-') => {
                    bail!("unknown argument: {arg}");
                }
                _ => {
                    Self::set_reference(&mut reference, arg)?;
                }
            }
        }

        let Some(reference) = reference else {
            bail!(
                "Usage: fetch_video [--dest <dir>] [--proxy <addr>] [--env <path>] [--quiet] <url-or-id>"
            );
        };

        Ok(Self {
            reference,
            dest,
            proxy,
            env_path,
            quiet,
        })
    }

    fn set_reference(target: &mut Option<String>, value: String) -> Result<()> {
        if target.is_some() {
            bail!("video reference specified multiple times");
        }
        *target = Some(value);
        Ok(())
    }
}

fn main() -> Result<()> {
    ensure_not_root("fetch_video")?;

    let args = FetchArgs::parse()?;
    let settings = resolve_runtime_settings(RuntimeOverrides {
        download_dir: args.dest.clone(),
        socks5_proxy: args.proxy.clone(),
        env_path: args.env_path.clone(),
    })?;

    let sink: Box<dyn DiagnosticSink> = if args.quiet {
        Box::new(NullSink)
    } else {
        Box::new(StderrSink)
    };

    let transport = Transport::new(settings.socks5_proxy.as_deref(), sink.as_ref())?;

    let id = extract_video_id(&args.reference, sink.as_ref())?;
    let fetcher = MetadataFetcher::new(&transport, sink.as_ref());
    let raw = fetcher
        .fetch(&id)
        .with_context(|| format!("fetching metadata for {id}"))?;
    let catalog: StreamCatalog = parse_stream_catalog(&raw, sink.as_ref())?;

    let (progress_tx, progress_rx) = progress_channel();
    // Consumer side of the progress channel: drains levels until the last
    // sender is dropped. The transfer never waits for this thread.
    let reporter = thread::spawn(move || {
        for level in progress_rx.iter() {
            print!("\r{level:3}%");
            let _ = std::io::stdout().flush();
        }
    });

    let outcome = {
        let engine = DownloadEngine::new(&transport, progress_tx, sink.as_ref());
        engine.download(&catalog, &settings.download_dir)?
        // Engine (and with it the producer handle) drops here, ending the
        // reporter's iteration.
    };

    let _ = reporter.join();
    println!();
    println!(
        "Saved {} ({} bytes)",
        outcome.path.display(),
        outcome.bytes_written
    );

    Ok(())
}
