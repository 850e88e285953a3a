//! Linux evdev backend

use evdev::{Device, InputEventKind, RelativeAxisType};
use tracing::debug;

use super::device::{DeviceEnumerator, InputDevice, InputError, KeyState, RawKeyEvent};
use super::keys::KeyId;

/// Enumerates `/dev/input/event*`
#[derive(Debug, Default)]
pub struct EvdevEnumerator;

impl DeviceEnumerator for EvdevEnumerator {
    fn enumerate(&mut self) -> Result<Vec<Box<dyn InputDevice>>, InputError> {
        let devices: Vec<Box<dyn InputDevice>> = evdev::enumerate()
            .map(|(path, device)| {
                let input = EvdevDevice::new(device);
                debug!(path = %path.display(), name = input.name(), "Found input device");
                Box::new(input) as Box<dyn InputDevice>
            })
            .collect();
        Ok(devices)
    }
}

/// An opened evdev device
pub struct EvdevDevice {
    name: String,
    pointer: bool,
    device: Device,
}

impl EvdevDevice {
    fn new(device: Device) -> Self {
        let name = device.name().unwrap_or("unknown").to_string();
        let has_rel_x = device
            .supported_relative_axes()
            .is_some_and(|axes| axes.contains(RelativeAxisType::REL_X));
        let lower = name.to_lowercase();
        let pointer = has_rel_x || lower.contains("mouse") || lower.contains("touchpad");
        Self {
            name,
            pointer,
            device,
        }
    }
}

impl InputDevice for EvdevDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_pointer(&self) -> bool {
        self.pointer
    }

    fn read_batch(&mut self) -> Result<Vec<RawKeyEvent>, InputError> {
        let events = self.device.fetch_events()?;
        Ok(events
            .filter_map(|event| match event.kind() {
                InputEventKind::Key(key) => KeyState::from_value(event.value())
                    .map(|state| RawKeyEvent::new(KeyId::new(format!("{key:?}")), state)),
                _ => None,
            })
            .collect())
    }
}
