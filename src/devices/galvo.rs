#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::GalvoVTable;

narrowed_device!(
    /// Galvanometer scanner for point illumination.
    GalvoDevice,
    GalvoVTable
);

impl GalvoDevice {
    /// Move to (`x`, `y`) and illuminate for `duration_us` microseconds.
    pub fn point_and_fire(&self, x: f64, y: f64, duration_us: f64) -> AdapterResult<()> {
        let _span = self.instance.loggers().device.enter();
        tracing::debug!(x, y, duration_us, "point and fire");
        self.instance.invoke(Call::op("point_and_fire"), |_, dev| unsafe {
            (self.vtable.point_and_fire)(dev, x, y, duration_us)
        })
    }

    /// Move to (`x`, `y`).
    pub fn set_position(&self, x: f64, y: f64) -> AdapterResult<()> {
        self.instance.invoke(Call::op("set_position"), |_, dev| unsafe {
            (self.vtable.set_position)(dev, x, y)
        })
    }

    /// Current (x, y).
    pub fn position(&self) -> AdapterResult<(f64, f64)> {
        let (mut x, mut y) = (0.0, 0.0);
        self.instance.invoke(Call::op("position"), |_, dev| unsafe {
            (self.vtable.get_position)(dev, &mut x, &mut y)
        })?;
        Ok((x, y))
    }

    /// Switch illumination on or off.
    pub fn set_illumination_state(&self, on: bool) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op("set_illumination_state"), |_, dev| unsafe {
                (self.vtable.set_illumination_state)(dev, on)
            })
    }

    /// X travel range as (min, max).
    pub fn x_range(&self) -> AdapterResult<(f64, f64)> {
        self.range("x_range", self.vtable.get_x_range)
    }

    /// Y travel range as (min, max).
    pub fn y_range(&self) -> AdapterResult<(f64, f64)> {
        self.range("y_range", self.vtable.get_y_range)
    }

    fn range(
        &self,
        operation: &str,
        get: unsafe extern "C" fn(
            *mut daq_adapter_api::RawDevice,
            *mut f64,
            *mut f64,
        ) -> i32,
    ) -> AdapterResult<(f64, f64)> {
        let (mut min, mut max) = (0.0, 0.0);
        self.instance.invoke(Call::op(operation), |_, dev| unsafe {
            get(dev, &mut min, &mut max)
        })?;
        Ok((min, max))
    }
}
