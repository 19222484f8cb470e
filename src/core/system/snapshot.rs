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

//! Serializable register dump of the whole machine

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::dma::ChannelId;
use crate::core::gs::{DisplayInfo, PrivilegedRegisters};

use super::System;

/// Point-in-time copy of the architecturally visible registers
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cycles: u64,
    pub frames: u64,
    pub in_vblank: bool,
    pub ee_intc: EeIntcSnapshot,
    pub iop_intc: IopIntcSnapshot,
    pub dmac: DmacSnapshot,
    pub sif: SifSnapshot,
    pub gs: GsSnapshot,
    pub tty: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EeIntcSnapshot {
    pub stat: u32,
    pub mask: u32,
    pub int0: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IopIntcSnapshot {
    pub stat: u32,
    pub mask: u32,
    pub ctrl: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DmacSnapshot {
    pub ctrl: u32,
    pub stat: u32,
    pub int1: bool,
    pub channels: Vec<ChannelSnapshot>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChannelSnapshot {
    pub name: &'static str,
    pub chcr: u32,
    pub madr: u32,
    pub qwc: u32,
    pub tadr: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SifSnapshot {
    pub mscom: u32,
    pub smcom: u32,
    pub msflg: u32,
    pub smflg: u32,
    pub sif0_pending: usize,
    pub sif1_pending: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GsSnapshot {
    pub renderer: &'static str,
    pub privileged: PrivilegedRegisters,
    pub display: Option<DisplayInfo>,
}

impl SystemSnapshot {
    pub(super) fn capture(system: &System) -> Self {
        let bus = system.bus();
        let dmac = system.dmac();

        let channels = ChannelId::ALL
            .iter()
            .map(|&id| {
                let ch = dmac.channel(id);
                ChannelSnapshot {
                    name: id.name(),
                    chcr: ch.chcr,
                    madr: ch.madr,
                    qwc: ch.qwc,
                    tadr: ch.tadr,
                }
            })
            .collect();

        Self {
            timestamp: Utc::now(),
            cycles: system.cycles(),
            frames: system.frames(),
            in_vblank: system.in_vblank(),
            ee_intc: EeIntcSnapshot {
                stat: bus.ee_intc.stat(),
                mask: bus.ee_intc.mask(),
                int0: bus.ee_intc.int0(),
            },
            iop_intc: IopIntcSnapshot {
                stat: bus.iop_intc.stat(),
                mask: bus.iop_intc.mask(),
                ctrl: bus.iop_intc.ctrl(),
            },
            dmac: DmacSnapshot {
                ctrl: dmac.read32(crate::core::dma::Dmac::CTRL_ADDR),
                stat: dmac.stat(),
                int1: dmac.int1(),
                channels,
            },
            sif: SifSnapshot {
                mscom: bus.sif.mscom(),
                smcom: bus.sif.smcom(),
                msflg: bus.sif.msflg(),
                smflg: bus.sif.smflg(),
                sif0_pending: bus.sif.sif0.len(),
                sif1_pending: bus.sif.sif1.len(),
            },
            gs: GsSnapshot {
                renderer: bus.gs.backend_name(),
                privileged: bus.gs.state().privileged,
                display: bus.gs.display_info(),
            },
            tty: bus.tty.output().to_string(),
        }
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> crate::core::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
