// Temperature cells. Read-only seasonal value, no occupancy and no
// contention: every plant in a cell feels the same temperature.

/// Per-cell temperature state, in degrees Celsius.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TemperatureCell {
    value: f32,
}

impl TemperatureCell {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }
}
