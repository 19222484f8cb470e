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

//! Core emulation components
//!
//! Everything in here is frontend-agnostic: no windowing, no audio, no file
//! formats beyond the BIOS image.

pub mod dma;
pub mod error;
pub mod gif;
pub mod gs;
pub mod interrupt;
pub mod iop_dma;
pub mod memory;
pub mod sif;
pub mod system;
