// src/common/reading.rs

use core::fmt::{self, Write};

/// Capacity of the rendered JSON form. Fits all three groups at their widest.
pub const JSON_CAPACITY: usize = 128;

/// PM2.5 and PM10 mass concentrations in ug/m3.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ParticulateReading {
    pub pm25: u16,
    pub pm10: u16,
}

/// Temperature in degrees Celsius and relative humidity in percent.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ClimateReading {
    pub temperature: f32,
    pub humidity: f32,
}

/// Equivalent CO2 in ppm and total VOC in ppb.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct GasReading {
    pub co2: u16,
    pub tvoc: u16,
}

/// One sensor's share of a cycle: a value plus its presence flag.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Slot<T> {
    pub has_data: bool,
    pub data: T,
}

impl<T: Copy> Slot<T> {
    /// Stores a fresh value and marks it present.
    #[inline]
    pub fn set(&mut self, data: T) {
        self.data = data;
        self.has_data = true;
    }

    /// Marks the slot absent. The stale value is left in place but unreachable via [`Slot::get`].
    #[inline]
    pub fn clear(&mut self) {
        self.has_data = false;
    }

    #[inline]
    pub fn get(&self) -> Option<T> {
        self.has_data.then_some(self.data)
    }
}

/// The aggregated, possibly partial, result of one measurement cycle.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct CompositeReading {
    pub particulate: Slot<ParticulateReading>,
    pub climate: Slot<ClimateReading>,
    pub gas: Slot<GasReading>,
}

impl CompositeReading {
    /// Drops every presence flag. Called before any sensor is read in a new cycle.
    pub fn reset(&mut self) {
        self.particulate.clear();
        self.climate.clear();
        self.gas.clear();
    }

    pub fn is_empty(&self) -> bool {
        !(self.particulate.has_data || self.climate.has_data || self.gas.has_data)
    }

    /// Renders the flat JSON object into a fixed-capacity string.
    pub fn to_json(&self) -> Result<heapless::String<JSON_CAPACITY>, fmt::Error> {
        let mut out = heapless::String::new();
        write!(out, "{}", self)?;
        Ok(out)
    }
}

/// Flat JSON object: particulate, then climate, then gas.
///
/// Absent groups contribute neither keys nor separators.
impl fmt::Display for CompositeReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('{')?;
        let mut first = true;
        let mut separator = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if first {
                first = false;
                Ok(())
            } else {
                f.write_char(',')
            }
        };

        if let Some(pm) = self.particulate.get() {
            separator(f)?;
            write!(f, "\"pm25\":{},\"pm10\":{}", pm.pm25, pm.pm10)?;
        }
        if let Some(climate) = self.climate.get() {
            separator(f)?;
            write!(
                f,
                "\"temperature\":{:.2},\"humidity\":{:.2}",
                climate.temperature, climate.humidity
            )?;
        }
        if let Some(gas) = self.gas.get() {
            separator(f)?;
            // Deployed consumers parse the key as "c02".
            write!(f, "\"tvoc\":{},\"c02\":{}", gas.tvoc, gas.co2)?;
        }

        f.write_char('}')
    }
}
