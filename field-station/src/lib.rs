//! Field event measurement station.
//!
//! Drives an EDM total station, a wind gauge and a scoreboard for athletics
//! field events: calibrates the instrument against a throwing circle,
//! turns readings into official marks, averages wind, and delivers results
//! to a results server with an on-disk fallback cache.
//!
//! ```no_run
//! use field_station::{CircleType, DeviceAddress, DeviceRole, Station, StationSettings};
//!
//! let station = Station::new(StationSettings::default());
//! station.connect(DeviceRole::Edm, &DeviceAddress::network("10.0.0.5", 4001))?;
//! station.select_circle(DeviceRole::Edm, CircleType::Discus);
//! station.set_centre(DeviceRole::Edm)?;
//! station.verify_edge(DeviceRole::Edm)?;
//! println!("{}", station.measure_throw(DeviceRole::Edm)?);
//! # Ok::<(), field_station::StationError>(())
//! ```

pub mod calibration;
pub mod circle;
pub mod delivery;
pub mod error;
pub mod geometry;
pub mod instrument;
pub mod measurement;
pub mod registry;
pub mod role;
pub mod settings;
pub mod simulated;
pub mod station;
pub mod supervisor;
pub mod throw_log;
pub mod wind;

pub use calibration::{CalibrationRecord, CalibrationState, EdgeVerification};
pub use circle::CircleType;
pub use delivery::{DeliveryError, HttpResultSink, ResultSink, RetryReport};
pub use error::{ErrorKind, StationError, StationResult};
pub use geometry::PlanePoint;
pub use instrument::{average_pair, Aim, AveragedReading, Instrument};
pub use measurement::format_mark;
pub use registry::DeviceSummary;
pub use role::{DeviceAddress, DeviceRole};
pub use settings::{EdgePolicy, StationSettings};
pub use simulated::SimulatedInstrument;
pub use station::Station;
pub use throw_log::{ThrowLog, ThrowRecord};
pub use wind::{format_wind, WindAverager};
