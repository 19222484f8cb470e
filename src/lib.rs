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

//! ps2rx: PlayStation 2 bus, DMA and Graphics Synthesizer emulation
//!
//! The crate models the part of the PS2 that moves data around and puts it on
//! screen: both CPUs' physical address maps, the interrupt controllers, the EE
//! DMAC and its tag chains, the SIF mailbox and FIFOs between EE and IOP, the
//! GIF unpacker and the GS with a software rasterizer. CPU cores are not
//! included; callers drive the buses directly.
//!
//! # Example
//!
//! ```
//! use ps2rx::config::{Config, RendererKind};
//! use ps2rx::core::memory::CpuBus;
//! use ps2rx::core::system::System;
//!
//! let config = Config {
//!     renderer: RendererKind::Null,
//!     ..Config::default()
//! };
//! let mut system = System::new(&config)?;
//!
//! // Set SIF mailbox MSCOM from the EE and read it back on the IOP side
//! system.ee_bus().write32(0x1000_F200, 0x1234);
//! assert_eq!(system.iop_bus().read32(0x1D00_0000), 0x1234);
//! # Ok::<(), ps2rx::EmulatorError>(())
//! ```
//!
//! # Modules
//!
//! - [`core::memory`]: address maps, RAM/BIOS, the shared [`core::memory::Bus`]
//! - [`core::interrupt`]: EE INTC and IOP INTC
//! - [`core::dma`]: EE DMAC and the tag-chain walker
//! - [`core::sif`]: mailbox registers and SIF FIFOs
//! - [`core::iop_dma`]: IOP SIF0/SIF1 channels
//! - [`core::gif`]: GIFtag unpacker
//! - [`core::gs`]: GS register file and rasterizer
//! - [`core::system`]: machine aggregate and frame timing
//! - [`config`]: TOML configuration
//!
//! # Error Handling
//!
//! Construction and file I/O return [`core::error::Result<T>`]. Bus traffic
//! never fails: unmapped accesses read as zero and writes are dropped.

pub mod config;
pub mod core;

// Re-export commonly used types
pub use config::{Config, RendererKind};
pub use core::error::{EmulatorError, Result};
