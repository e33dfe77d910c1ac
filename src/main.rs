//! notepad-gui - write text straight into a running Notepad's buffer.
//!
//! # Usage
//!
//! ```bash
//! notepad-gui --text "hello" --x 10 --y 3
//! notepad-gui --create always --ownership never --json
//! notepad-gui --wait fixed --wait-ms 5000 --save
//! ```

use std::io::BufRead;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use notepad_gui::buffer::BufferDescriptor;
use notepad_gui::client::{Client, ClientOptions};
use notepad_gui::config::{
    ConfigFlags, CreationPolicy, EditorProfile, OwnershipPolicy, WaitMode, clear_config_flags,
    global_config_path, load_config_flags, local_override_path, parse_flag_tokens,
    save_config_flags,
};
use notepad_gui::discovery::HandshakeWait;
use notepad_gui::encoding::TextEncoding;
use notepad_gui::platform;

/// Locate a Notepad window's text buffer and write into it
#[derive(Parser, Debug)]
#[command(name = "notepad-gui", version, about, long_about = None)]
struct Cli {
    /// When to start a new Notepad instead of attaching to a running one
    #[arg(long, value_enum)]
    create: Option<CreationPolicy>,

    /// When to close Notepad on exit
    #[arg(long, value_enum)]
    ownership: Option<OwnershipPolicy>,

    /// How to wait for the typed marker to reach the buffer
    #[arg(long, value_enum)]
    wait: Option<WaitMode>,

    /// Sleep (fixed) or timeout (poll) for the handshake, in milliseconds
    #[arg(long, value_name = "MS")]
    wait_ms: Option<u64>,

    /// Text to write once the buffer is found
    #[arg(long)]
    text: Option<String>,

    /// Column to write at
    #[arg(long, default_value_t = 0)]
    x: usize,

    /// Row to write at
    #[arg(long, default_value_t = 0)]
    y: usize,

    /// Print the discovered buffer as JSON
    #[arg(long)]
    json: bool,

    /// Wait for Enter before detaching
    #[arg(long)]
    hold: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    pid: u32,
    created: bool,
    encoding: TextEncoding,
    buffer: &'a BufferDescriptor,
}

fn main() -> Result<()> {
    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args)?;

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    // Initialize logging
    let level = if effective.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let profile = EditorProfile::default();
    let encoding = profile.encoding;
    let mut options = ClientOptions::default()
        .with_creation(effective.create.unwrap_or_default())
        .with_ownership(effective.ownership.unwrap_or_default())
        .with_wait(HandshakeWait::from_mode(
            effective.wait.unwrap_or_default(),
            effective.wait_ms,
        ))
        .with_profile(profile);
    if effective.verbose {
        options = options.with_progress(|message: &str| eprintln!("Client: {message}"));
    }

    let host = platform::native()?;
    let client = Client::connect(host, options).context("Failed to find the Notepad buffer")?;
    let Some(descriptor) = client.descriptor() else {
        anyhow::bail!("discovery finished without a buffer");
    };

    if effective.json {
        let report = Report {
            pid: client.process_id(),
            created: client.created_process(),
            encoding,
            buffer: descriptor,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let size = descriptor.size();
        println!(
            "buffer at {:#x}: {}x{} cells, {} bytes per cell (pid {})",
            descriptor.base_address(),
            size.width,
            size.height,
            descriptor.bytes_per_char(),
            client.process_id()
        );
    }

    if let Some(text) = cli.text.as_deref() {
        let offset = client.offset(cli.x, cli.y);
        client
            .write(text, offset)
            .with_context(|| format!("Failed to write at ({}, {})", cli.x, cli.y))?;
    }

    if cli.hold {
        eprintln!("Press Enter to detach...");
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
    }

    Ok(())
}
