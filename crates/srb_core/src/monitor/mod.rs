//! Optional NVIDIA GPU utilization monitor (feature `gpu`).
//!
//! Polls NVML on a background thread and hands each reading to a
//! callback, so a presentation layer can show how busy the GPU is
//! while upscales run. Purely observational; batch execution never
//! depends on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;

/// One utilization sample from the first NVIDIA GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuReading {
    /// Device name, cached at startup (it never changes at runtime).
    pub name: String,
    /// GPU core utilization, 0-100.
    pub utilization_percent: u32,
    /// Used device memory in MiB.
    pub memory_used_mb: u64,
    /// Total device memory in MiB.
    pub memory_total_mb: u64,
}

/// Check whether an NVIDIA GPU is reachable through NVML.
pub fn is_available() -> bool {
    Nvml::init().is_ok()
}

/// Wrapper around NVML for the first NVIDIA GPU.
pub struct GpuProbe {
    nvml: Nvml,
    device_index: u32,
    cached_name: String,
}

impl GpuProbe {
    /// Initialize NVML and cache the device name.
    ///
    /// Fails when NVIDIA drivers are absent or NVML cannot start; the
    /// caller should fall back to running without GPU readings.
    pub fn new() -> Result<Self, NvmlError> {
        let nvml = Nvml::init()?;
        let device = nvml.device_by_index(0)?;
        let cached_name = device.name()?;

        Ok(Self {
            nvml,
            device_index: 0,
            cached_name,
        })
    }

    /// Take one utilization sample.
    pub fn sample(&self) -> Result<GpuReading, NvmlError> {
        let device = self.nvml.device_by_index(self.device_index)?;
        let utilization = device.utilization_rates()?;
        let memory = device.memory_info()?;

        Ok(GpuReading {
            name: self.cached_name.clone(),
            utilization_percent: utilization.gpu,
            memory_used_mb: memory.used / (1024 * 1024),
            memory_total_mb: memory.total / (1024 * 1024),
        })
    }
}

/// Background poller delivering periodic [`GpuReading`]s to a callback.
///
/// The polling thread stops when `stop` is called or the monitor is
/// dropped. Failed samples are skipped silently; NVML hiccups must not
/// disturb a running batch.
pub struct GpuMonitor {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl GpuMonitor {
    /// Start polling every `interval`, delivering readings to `on_reading`.
    pub fn start<F>(probe: GpuProbe, interval: Duration, on_reading: F) -> Self
    where
        F: Fn(GpuReading) + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_flag);

        let builder = std::thread::Builder::new().name("srb-gpu-monitor".to_string());
        let handle = builder
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    match probe.sample() {
                        Ok(reading) => on_reading(reading),
                        Err(e) => tracing::debug!("gpu sample failed: {}", e),
                    }
                    std::thread::sleep(interval);
                }
            })
            .map_err(|e| tracing::error!("failed to spawn gpu monitor thread: {}", e))
            .ok();

        Self {
            stop_flag,
            handle,
        }
    }

    /// Stop the polling thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GpuMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
