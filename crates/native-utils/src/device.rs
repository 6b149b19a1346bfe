use anyhow::{Context, Result};
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the named input device, or the host default when no name is given.
///
/// `Ok(None)` means the host has no such device.
pub fn find_input(device_name: Option<&str>) -> Result<Option<Device>> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    let Some(target) = device_name else {
        return Ok(host.default_input_device());
    };
    let devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;
    Ok(devices
        .into_iter()
        .find(|device| device.name().is_ok_and(|name| name == target)))
}

/// Same as [`find_input`] for output devices.
pub fn find_output(device_name: Option<&str>) -> Result<Option<Device>> {
    let host = get_host();
    let Some(target) = device_name else {
        return Ok(host.default_output_device());
    };
    let devices = host
        .output_devices()
        .context("Failed to enumerate output devices")?;
    Ok(devices
        .into_iter()
        .find(|device| device.name().is_ok_and(|name| name == target)))
}

/// One line per input device with its default config; the default device is marked.
pub fn describe_inputs() -> Result<String> {
    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let mut lines = Vec::new();
    for device in host.input_devices().context("No input devices found")? {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let mut line = match device.default_input_config() {
            Ok(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
            Err(_) => format!(" * {}(no default config)", name),
        };
        if default_name.as_deref() == Some(name.as_str()) {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
