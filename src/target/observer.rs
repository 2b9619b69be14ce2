use qtty::{Degrees, Meters};

/// Geographic position of the observatory.
///
/// Supplied once per process and shared read-only by every queue.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observer {
    pub longitude: Degrees,
    pub latitude: Degrees,
    pub altitude: Meters,
}

impl Observer {
    pub const fn new(longitude: Degrees, latitude: Degrees, altitude: Meters) -> Self {
        Self {
            longitude,
            latitude,
            altitude,
        }
    }
}
