// gpu/device.rs — wgpu device and adapter selection.
//
// Responsibilities:
//   - Enumerate adapters on the primary backends and hand the list to an
//     `AdapterPolicy`, which picks one (or none).
//   - Own the `wgpu::Device` / `wgpu::Queue` pair for the lifetime of the
//     edge extractor.
//   - Provide `WorkgroupSize` and `dispatch_size` for 2D image kernels.
//
// ADAPTER SELECTION:
// wgpu's `request_adapter` uses power-preference heuristics that may return
// llvmpipe/softpipe on machines where the software renderer registers as a
// valid device. We enumerate explicitly and let the policy decide. The
// default `FirstGpu` rejects anything with DeviceType::Cpu: a software
// rasterizer cannot keep up with the tick rate, so failing fast at startup
// is better than a tracker that silently lags.
//
// There is no retry. If no adapter qualifies, construction returns
// `GpuError::NoSuitableAdapter` and the caller decides what to do (the CPU
// extractor in `edges` is always available).

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A workgroup configuration for 2D compute dispatches.
///
/// Injected into the WGSL source at pipeline creation (`{{WG_X}}`,
/// `{{WG_Y}}` placeholders).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// 16×8 = 128 invocations: 4 NVIDIA warps or 2 AMD wavefronts, and the
    /// 16-wide rows line up with cache lines of row-major pixel data.
    pub const DEFAULT: WorkgroupSize = WorkgroupSize { x: 16, y: 8 };

    /// Validated size: both sides non-zero and at most `max` invocations.
    pub fn checked(x: u32, y: u32, max: u32) -> Result<Self, GpuError> {
        let total = u64::from(x) * u64::from(y);
        if total == 0 || total > u64::from(max) {
            return Err(GpuError::WorkgroupTooLarge { total, max });
        }
        Ok(WorkgroupSize { x, y })
    }

    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x.saturating_mul(self.y)
    }

    /// Workgroups needed to cover a `w`×`h` grid (ceiling division).
    ///
    /// The shader must guard against out-of-bounds global IDs.
    pub fn dispatch_size(&self, w: u32, h: u32) -> (u32, u32) {
        ((w + self.x - 1) / self.x, (h + self.y - 1) / self.y)
    }

    /// Substitute the workgroup placeholders in a WGSL template.
    pub fn specialize(&self, template: &str) -> String {
        template
            .replace("{{WG_X}}", &self.x.to_string())
            .replace("{{WG_Y}}", &self.y.to_string())
    }
}

impl Default for WorkgroupSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Cached adapter information, the input to an `AdapterPolicy`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl AdapterInfo {
    pub fn is_software(&self) -> bool {
        self.device_type == wgpu::DeviceType::Cpu
    }
}

impl From<&wgpu::AdapterInfo> for AdapterInfo {
    fn from(raw: &wgpu::AdapterInfo) -> Self {
        AdapterInfo {
            name: raw.name.clone(),
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

// ============================================================
// Adapter policy
// ============================================================

/// Chooses an adapter from the enumerated list.
///
/// Returns the index into `adapters`, or `None` to reject them all.
pub trait AdapterPolicy {
    fn choose(&self, adapters: &[AdapterInfo]) -> Option<usize>;
}

/// First hardware adapter in enumeration order; software renderers are
/// never chosen.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstGpu;

impl AdapterPolicy for FirstGpu {
    fn choose(&self, adapters: &[AdapterInfo]) -> Option<usize> {
        adapters.iter().position(|a| !a.is_software())
    }
}

/// First adapter of any kind. Intended for CI machines that only have
/// llvmpipe.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowSoftware;

impl AdapterPolicy for AllowSoftware {
    fn choose(&self, adapters: &[AdapterInfo]) -> Option<usize> {
        if adapters.is_empty() { None } else { Some(0) }
    }
}

/// Serializable selector for the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterChoice {
    #[default]
    FirstGpu,
    AllowSoftware,
}

impl AdapterChoice {
    pub fn policy(self) -> &'static dyn AdapterPolicy {
        match self {
            AdapterChoice::FirstGpu => &FirstGpu,
            AdapterChoice::AllowSoftware => &AllowSoftware,
        }
    }
}

// ============================================================
// GpuDevice
// ============================================================

/// The GPU context: device, queue, the adapter it came from, and the
/// workgroup size kernels are specialised with.
///
/// # Field drop order
/// Rust drops struct fields in declaration order. `_instance` is declared
/// last so the `wgpu::Instance` outlives `device` and `queue`; some Vulkan
/// layers crash when the instance goes first.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a device on the first hardware adapter.
    pub fn new() -> Result<Self, GpuError> {
        Self::new_with_policy(&FirstGpu)
    }

    /// Create a device using one of the built-in policies.
    pub fn from_choice(choice: AdapterChoice) -> Result<Self, GpuError> {
        Self::new_with_policy(choice.policy())
    }

    pub fn new_with_policy(policy: &dyn AdapterPolicy) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(policy))
    }

    async fn init_async(policy: &dyn AdapterPolicy) -> Result<Self, GpuError> {
        // Non-conformant adapters (dzn on WSL2) are enumerated too; the
        // kernel is compute-only and does not depend on conformance.
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let mut adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        let infos: Vec<AdapterInfo> = adapters.iter().map(|a| AdapterInfo::from(&a.get_info())).collect();
        for info in &infos {
            debug!("adapter: {info}");
        }

        let index = policy.choose(&infos).ok_or(GpuError::NoSuitableAdapter)?;
        if index >= adapters.len() {
            return Err(GpuError::NoSuitableAdapter);
        }
        let adapter = adapters.swap_remove(index);
        let adapter_info = infos[index].clone();
        info!("using adapter {adapter_info}");

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("cone-compass"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            workgroup_size: WorkgroupSize::DEFAULT,
            _instance: instance,
        })
    }

    /// Override the workgroup size, validated against the device limits.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<(), GpuError> {
        let max = self.device.limits().max_compute_invocations_per_workgroup;
        self.workgroup_size = WorkgroupSize::checked(x, y, max)?;
        Ok(())
    }

    /// Workgroups needed to cover an image with the active workgroup size.
    pub fn dispatch_size(&self, img_w: u32, img_h: u32) -> (u32, u32) {
        self.workgroup_size.dispatch_size(img_w, img_h)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuDevice {{ adapter: {}, workgroup: {} }}", self.adapter_info, self.workgroup_size)
    }
}

// ============================================================
// Error type
// ============================================================

/// Errors from GPU device initialisation and configuration.
#[derive(Debug, Error)]
pub enum GpuError {
    /// The adapter policy rejected every enumerated adapter (or none were
    /// found). With `FirstGpu` this means only software renderers exist.
    #[error("no suitable GPU adapter found (only CPU/software renderers visible, or none)")]
    NoSuitableAdapter,
    #[error("device request failed: {0}")]
    DeviceRequest(#[source] wgpu::RequestDeviceError),
    #[error("workgroup size {total} exceeds device limit of {max} invocations")]
    WorkgroupTooLarge { total: u64, max: u32 },
}

// ============================================================
// Tests
// ============================================================
