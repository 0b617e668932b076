use chrono::{DateTime, Utc};
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;
use serde::Serialize;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

/// Reserved metric namespace for resource telemetry. Training losses never
/// use this prefix, so the two series cannot collide.
pub const SYSTEM_METRIC_PREFIX: &str = "system/";

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One point-in-time resource measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub at: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
    /// Absent when no accelerator is queryable.
    pub accelerator: Option<AcceleratorSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceleratorSample {
    pub utilization_percent: f64,
    pub memory_used_gb: f64,
    /// Individually optional: some devices expose utilization but not
    /// temperature or power.
    pub temperature_c: Option<f64>,
    pub power_watts: Option<f64>,
}

impl TelemetrySample {
    /// Metric `(name, value)` pairs under the reserved namespace.
    #[must_use]
    pub fn metrics(&self) -> Vec<(String, f64)> {
        let mut out = vec![
            (format!("{SYSTEM_METRIC_PREFIX}cpu_percent"), self.cpu_percent),
            (format!("{SYSTEM_METRIC_PREFIX}memory_percent"), self.memory_percent),
            (format!("{SYSTEM_METRIC_PREFIX}memory_used_gb"), self.memory_used_gb),
        ];
        if let Some(acc) = &self.accelerator {
            out.push((
                format!("{SYSTEM_METRIC_PREFIX}gpu_utilization_percent"),
                acc.utilization_percent,
            ));
            out.push((
                format!("{SYSTEM_METRIC_PREFIX}gpu_memory_used_gb"),
                acc.memory_used_gb,
            ));
            if let Some(temperature) = acc.temperature_c {
                out.push((format!("{SYSTEM_METRIC_PREFIX}gpu_temperature_c"), temperature));
            }
            if let Some(power) = acc.power_watts {
                out.push((format!("{SYSTEM_METRIC_PREFIX}gpu_power_watts"), power));
            }
        }
        out
    }
}

struct HostReading {
    cpu_percent: f64,
    memory_percent: f64,
    memory_used_gb: f64,
}

/// Host CPU and memory readings.
pub struct HostSampler {
    system: System,
}

impl HostSampler {
    #[must_use]
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        Self { system }
    }

    /// CPU usage is a delta between refreshes; the very first reading after
    /// startup reports zero.
    fn read(&mut self) -> HostReading {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let used = self.system.used_memory();
        HostReading {
            cpu_percent: f64::from(self.system.global_cpu_info().cpu_usage()),
            memory_percent: if total == 0 {
                0.0
            } else {
                used as f64 / total as f64 * 100.0
            },
            memory_used_gb: used as f64 / BYTES_PER_GB,
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Accelerator-side readings. Implementations must never panic when the
/// device goes away; returning `None` degrades the tick to host-only.
pub trait AcceleratorProbe: Send {
    fn sample(&mut self) -> Option<AcceleratorSample>;
}

/// NVML-backed probe for the first NVIDIA device.
pub struct NvmlProbe {
    nvml: Nvml,
    device_index: u32,
}

impl NvmlProbe {
    /// `None` when NVML is unavailable (no driver, no device); the run
    /// then carries host telemetry only.
    #[must_use]
    pub fn init() -> Option<Self> {
        let nvml = match Nvml::init() {
            Ok(nvml) => nvml,
            Err(e) => {
                debug!("NVML unavailable: {e}");
                return None;
            }
        };
        match nvml.device_count() {
            Ok(count) if count > 0 => Some(Self { nvml, device_index: 0 }),
            Ok(_) => {
                debug!("NVML reports no devices");
                None
            }
            Err(e) => {
                debug!("NVML device enumeration failed: {e}");
                None
            }
        }
    }
}

impl AcceleratorProbe for NvmlProbe {
    fn sample(&mut self) -> Option<AcceleratorSample> {
        let device = match self.nvml.device_by_index(self.device_index) {
            Ok(device) => device,
            Err(e) => {
                debug!("accelerator query failed: {e}");
                return None;
            }
        };
        let utilization = device.utilization_rates().ok()?;
        let memory = device.memory_info().ok()?;
        Some(AcceleratorSample {
            utilization_percent: f64::from(utilization.gpu),
            memory_used_gb: memory.used as f64 / BYTES_PER_GB,
            temperature_c: device.temperature(TemperatureSensor::Gpu).ok().map(f64::from),
            power_watts: device.power_usage().ok().map(|mw| f64::from(mw) / 1000.0),
        })
    }
}

/// Combined host + optional accelerator sampler used by the supervisor.
pub struct TelemetrySampler {
    host: HostSampler,
    accelerator: Option<Box<dyn AcceleratorProbe>>,
}

impl TelemetrySampler {
    #[must_use]
    pub fn new(accelerator: Option<Box<dyn AcceleratorProbe>>) -> Self {
        Self { host: HostSampler::new(), accelerator }
    }

    /// Host sampling plus NVML when present.
    #[must_use]
    pub fn with_default_probes() -> Self {
        let accelerator =
            NvmlProbe::init().map(|probe| Box::new(probe) as Box<dyn AcceleratorProbe>);
        Self::new(accelerator)
    }

    pub fn sample(&mut self) -> TelemetrySample {
        let host = self.host.read();
        TelemetrySample {
            at: Utc::now(),
            cpu_percent: host.cpu_percent,
            memory_percent: host.memory_percent,
            memory_used_gb: host.memory_used_gb,
            accelerator: self.accelerator.as_mut().and_then(|probe| probe.sample()),
        }
    }
}
