// ============================================================
// Layer 5 — Compute Backends
// ============================================================
// Training runs on Autodiff<Backend>; validation and
// evaluation run on the plain backend (no autodiff graph).
//
//   cpu  → NdArray       (always available)
//   wgpu → Wgpu          (Vulkan / Metal / DX12)
//
// The device tag is part of the checkpoint file name.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type CpuBackend = burn::backend::NdArray<f32>;
pub type GpuBackend = burn::backend::Wgpu;

pub type CpuAutodiff = burn::backend::Autodiff<CpuBackend>;
pub type GpuAutodiff = burn::backend::Autodiff<GpuBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Wgpu,
}

impl ComputeDevice {
    pub fn tag(self) -> &'static str {
        match self {
            ComputeDevice::Cpu  => "cpu",
            ComputeDevice::Wgpu => "wgpu",
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
