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

//! I/O device trait for memory-mapped register files
//!
//! Register windows in the address map use absolute translation: the bus hands
//! the full physical address to the device, which decodes it itself.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              EE / IOP bus                   │
//! ├─────────────────────────────────────────────┤
//! │  AddressMap::lookup(addr, WORD)             │
//! │    Intc  => dispatch_read(&mut intc, addr)  │
//! │    Gif   => dispatch_read(&mut gif, addr)   │
//! │    ...                                      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use ps2rx::core::memory::IoDevice;
//!
//! struct Latch {
//!     value: u32,
//! }
//!
//! impl IoDevice for Latch {
//!     fn name(&self) -> &'static str {
//!         "LATCH"
//!     }
//!
//!     fn read32(&mut self, _addr: u32) -> u32 {
//!         self.value
//!     }
//!
//!     fn write32(&mut self, _addr: u32, value: u32) {
//!         self.value = value;
//!     }
//! }
//!
//! let mut latch = Latch { value: 0 };
//! latch.write64(0x1000, 0xAAAA_BBBB_0000_0001);
//! assert_eq!(latch.read32(0x1000), 0xAAAA_BBBB);
//! ```

/// Memory-mapped register file
///
/// Reads take `&mut self` because some registers change on read (the IOP
/// I_CTRL register clears itself, for example).
pub trait IoDevice {
    /// Short device name used in log messages
    fn name(&self) -> &'static str;

    /// Read a 32-bit register at an absolute address
    fn read32(&mut self, addr: u32) -> u32;

    /// Write a 32-bit register at an absolute address
    fn write32(&mut self, addr: u32, value: u32);

    /// Read a 64-bit register as two consecutive words
    fn read64(&mut self, addr: u32) -> u64 {
        let lo = self.read32(addr) as u64;
        let hi = self.read32(addr.wrapping_add(4)) as u64;
        lo | (hi << 32)
    }

    /// Write a 64-bit register as two consecutive words (low word first)
    fn write64(&mut self, addr: u32, value: u64) {
        self.write32(addr, value as u32);
        self.write32(addr.wrapping_add(4), (value >> 32) as u32);
    }
}

/// Read a device register with bus tracing
#[inline]
pub fn dispatch_read32<D: IoDevice + ?Sized>(device: &mut D, addr: u32) -> u32 {
    let value = device.read32(addr);
    log::trace!("{}: read 0x{:08X} -> 0x{:08X}", device.name(), addr, value);
    value
}

/// Write a device register with bus tracing
#[inline]
pub fn dispatch_write32<D: IoDevice + ?Sized>(device: &mut D, addr: u32, value: u32) {
    log::trace!("{}: write 0x{:08X} <- 0x{:08X}", device.name(), addr, value);
    device.write32(addr, value);
}
