use std::env;
use std::sync::OnceLock;

use burn::backend::ndarray::{NdArray, NdArrayDevice};
#[cfg(target_os = "macos")]
use burn::backend::wgpu::{self, WgpuDevice, graphics::Metal};
#[cfg(not(target_os = "macos"))]
use burn::backend::wgpu::{self, WgpuDevice, graphics::Vulkan};
#[cfg(feature = "cuda")]
use burn::backend::{Cuda, cuda::CudaDevice};
use tracing::warn;

/// Environment variable selecting the compute backend.
pub const BACKEND_ENV: &str = "SEMOTION_BACKEND";

pub(crate) type CpuDevice = NdArrayDevice;
pub(crate) type CpuBackend = NdArray;
pub(crate) type GpuDevice = WgpuDevice;
pub(crate) type GpuBackend = wgpu::Wgpu;
#[cfg(feature = "cuda")]
pub(crate) type CudaGpuDevice = CudaDevice;
#[cfg(feature = "cuda")]
pub(crate) type CudaBackend = Cuda;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Cpu,
    Wgpu,
    #[cfg(feature = "cuda")]
    Cuda,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Cpu => "ndarray",
            BackendKind::Wgpu => "wgpu",
            #[cfg(feature = "cuda")]
            BackendKind::Cuda => "cuda",
        }
    }
}

/// Backend requested through [`BACKEND_ENV`]; the CPU backend when unset.
pub fn backend_kind() -> BackendKind {
    parse_backend(env::var(BACKEND_ENV).ok().as_deref())
}

fn parse_backend(requested: Option<&str>) -> BackendKind {
    let requested = requested.map(|value| value.trim().to_ascii_lowercase());
    match requested.as_deref() {
        #[cfg(feature = "cuda")]
        Some("cuda") => BackendKind::Cuda,
        Some("wgpu") | Some("vulkan") | Some("metal") | Some("gpu") => BackendKind::Wgpu,
        Some("cpu") | Some("ndarray") | Some("") | None => BackendKind::Cpu,
        Some(other) => {
            warn!("Unknown backend '{other}', defaulting to CPU.");
            BackendKind::Cpu
        }
    }
}

pub(crate) fn init_wgpu(device: &WgpuDevice) {
    static WGPU_INIT: OnceLock<()> = OnceLock::new();
    WGPU_INIT.get_or_init(|| {
        init_cubecl_config();
        #[cfg(target_os = "macos")]
        wgpu::init_setup::<Metal>(device, Default::default());
        #[cfg(not(target_os = "macos"))]
        wgpu::init_setup::<Vulkan>(device, Default::default());
    });
}

fn init_cubecl_config() {
    static CUBECL_CONFIG: OnceLock<()> = OnceLock::new();
    CUBECL_CONFIG.get_or_init(|| {
        let mut config = cubecl_runtime::config::GlobalConfig::default();
        config.compilation.cache = Some(cubecl_runtime::config::cache::CacheConfig::Global);
        config.autotune.cache = cubecl_runtime::config::cache::CacheConfig::Global;
        let _ = std::panic::catch_unwind(|| cubecl_runtime::config::GlobalConfig::set(config));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_defaults_to_cpu() {
        assert_eq!(parse_backend(None), BackendKind::Cpu);
        assert_eq!(parse_backend(Some(" NDARRAY ")), BackendKind::Cpu);
        assert_eq!(parse_backend(Some("bogus")), BackendKind::Cpu);
        assert_eq!(parse_backend(Some("Vulkan")), BackendKind::Wgpu);
    }
}
