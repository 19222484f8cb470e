// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Headless PS2 bus/GS runner
//!
//! Loads a BIOS, optionally pushes a GIF packet through GIF DMA, runs a number
//! of frames and writes the displayed frame and a register dump to disk.

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use ps2rx::core::gs::DisplayImage;
use ps2rx::core::system::System;
use ps2rx::{Config, RendererKind};

/// EE RAM address GIF packets are loaded at
const GIF_PACKET_ADDR: u32 = 0x0010_0000;

/// PlayStation 2 bus, DMA and GS emulator
#[derive(Parser, Debug)]
#[command(name = "ps2rx", version, about)]
struct Args {
    /// BIOS image (overrides the config file and PS2RX_BIOS)
    #[arg(short, long, value_name = "FILE")]
    bios: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rasterizer: software or null
    #[arg(short, long)]
    renderer: Option<RendererKind>,

    /// Number of frames to run
    #[arg(short, long, default_value_t = 1)]
    frames: u64,

    /// Raw GIF packet sent through GIF DMA before the first frame
    #[arg(long, value_name = "FILE")]
    gif: Option<PathBuf>,

    /// Write the displayed frame as a binary PPM
    #[arg(long, value_name = "FILE")]
    screenshot: Option<PathBuf>,

    /// Write a JSON register dump on exit
    #[arg(long, value_name = "FILE")]
    dump_state: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let mut system = System::new(&config)?;

    if let Some(path) = args.dump_state.clone() {
        system.set_diagnostic_hook(Box::new(move |s: &System| {
            if let Err(e) = write_state(s, &path) {
                log::error!("Failed to write state dump: {}", e);
            }
        }));
    }

    if let Some(path) = &args.gif {
        let packet = std::fs::read(path)?;
        log::info!("Sending {} ({} bytes) through GIF DMA", path.display(), packet.len());
        system.send_gif_packet(GIF_PACKET_ADDR, &packet);
    }

    for _ in 0..args.frames {
        system.run_frame();
    }

    log::info!("Ran {} frames ({} cycles)", system.frames(), system.cycles());

    if let Some(path) = &args.screenshot {
        match system.gs().capture_display() {
            Some(image) => {
                write_ppm(&image, path)?;
                log::info!(
                    "Wrote {}x{} screenshot to {}",
                    image.width,
                    image.height,
                    path.display()
                );
            }
            None => log::warn!("No display circuit enabled, screenshot skipped"),
        }
    }

    system.shutdown();

    Ok(())
}

/// Config file, then environment, then command line
fn build_config(args: &Args) -> ps2rx::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    config.apply_env()?;

    if let Some(bios) = &args.bios {
        config.bios_path = Some(bios.clone());
    }

    if let Some(renderer) = args.renderer {
        config.renderer = renderer;
    }

    if config.bios_path.is_none() {
        log::warn!("No BIOS configured, BIOS region reads as zero");
    }

    Ok(config)
}

fn write_state(system: &System, path: &Path) -> ps2rx::Result<()> {
    let json = system.snapshot().to_json()?;
    std::fs::write(path, json)?;
    log::info!("Wrote state dump to {}", path.display());
    Ok(())
}

fn write_ppm(image: &DisplayImage, path: &Path) -> std::io::Result<()> {
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    write!(out, "P6\n{} {}\n255\n", image.width, image.height)?;

    for &pixel in &image.pixels {
        out.write_all(&[pixel as u8, (pixel >> 8) as u8, (pixel >> 16) as u8])?;
    }

    out.flush()
}
