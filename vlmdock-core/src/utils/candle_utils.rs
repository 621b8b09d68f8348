use anyhow::Result;
use candle_core::{
    utils::{cuda_is_available, metal_is_available},
    Device,
};

pub fn select_device(force_cpu: bool) -> Result<Device> {
    if force_cpu {
        Ok(Device::Cpu)
    } else if cuda_is_available() {
        Ok(Device::new_cuda(0)?)
    } else if metal_is_available() {
        Ok(Device::new_metal(0)?)
    } else {
        Ok(Device::Cpu)
    }
}

/// Short label for logs and the startup banner.
pub fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_cpu() {
        let device = select_device(true).unwrap();
        assert!(matches!(device, Device::Cpu));
        assert_eq!(device_label(&device), "cpu");
    }
}
