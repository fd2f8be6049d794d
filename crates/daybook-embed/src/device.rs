use candle_core::Device;
use tracing::info;

/// Pick a compute device. `"metal"`/`"mps"` is honoured only when built with the
/// `metal` feature and a GPU is present; everything else runs on the CPU.
pub fn select_device(preference: &str) -> Device {
    #[cfg(feature = "metal")]
    {
        if matches!(preference, "metal" | "mps" | "auto") {
            if let Ok(dev) = Device::new_metal(0) {
                info!("device: metal");
                return dev;
            }
        }
    }
    info!(requested = preference, "device: cpu");
    Device::Cpu
}
