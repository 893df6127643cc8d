//! Shared types and constants for the ParkSense telemetry pipeline.
//!
//! This crate provides the foundational types used across all ParkSense
//! crates: the validated [`SensorReading`], the sensor-type vocabulary with
//! its static unit table, the transport topic scheme, and the envelope used
//! for live fan-out to connected viewers.
//!
//! No crate in the workspace depends on anything *except* `parksense-types`
//! for cross-cutting type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// First fixed segment of every sensor topic.
pub const TOPIC_NAMESPACE: &str = "parking";

/// Second fixed segment of every sensor topic.
pub const TOPIC_CATEGORY: &str = "sensor";

/// Number of `/`-separated segments in a sensor topic:
/// `<namespace>/<category>/<sensorType>/<sensorInstanceId>`.
pub const TOPIC_SEGMENTS: usize = 4;

/// Live event name used when a reading is fanned out to viewers.
pub const READING_EVENT: &str = "sensor_reading";

/// Sensor types with a known unit.
///
/// Readings whose type is not in this vocabulary are still accepted; they
/// simply carry an empty unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    /// Parking bay occupancy (0 = free, 1 = occupied).
    Occupancy,
    /// Carbon monoxide concentration.
    CarbonMonoxide,
    /// Ambient temperature.
    Temperature,
    /// Energy drawn by chargers and lighting.
    EnergyConsumption,
    /// Relative humidity.
    Humidity,
    /// Ambient noise.
    NoiseLevel,
    /// Composite air quality index.
    AirQuality,
}

impl SensorType {
    /// Every known sensor type, in table order.
    pub const ALL: [SensorType; 7] = [
        Self::Occupancy,
        Self::CarbonMonoxide,
        Self::Temperature,
        Self::EnergyConsumption,
        Self::Humidity,
        Self::NoiseLevel,
        Self::AirQuality,
    ];

    /// Returns the topic segment for this sensor type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Occupancy => "occupancy",
            Self::CarbonMonoxide => "carbon_monoxide",
            Self::Temperature => "temperature",
            Self::EnergyConsumption => "energy_consumption",
            Self::Humidity => "humidity",
            Self::NoiseLevel => "noise_level",
            Self::AirQuality => "air_quality",
        }
    }

    /// Returns the unit readings of this type are reported in.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Occupancy => "status",
            Self::CarbonMonoxide => "ppm",
            Self::Temperature => "°C",
            Self::EnergyConsumption => "kWh",
            Self::Humidity => "%",
            Self::NoiseLevel => "dB",
            Self::AirQuality => "AQI",
        }
    }

    /// Looks up a sensor type by its topic segment.
    ///
    /// Returns `None` for anything outside the known vocabulary.
    pub fn from_topic_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == segment)
    }
}

/// Resolves the unit for a raw sensor type string.
///
/// Unknown types yield an empty string: the unit is decorative metadata,
/// not a validity gate.
pub fn unit_for(sensor_type: &str) -> &'static str {
    SensorType::from_topic_segment(sensor_type)
        .map(SensorType::unit)
        .unwrap_or("")
}

/// One accepted sensor observation.
///
/// Created once per accepted transport message and never mutated after
/// dispatch. `sensor_type` and `sensor_instance_id` are always non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Sensor type segment from the topic (may be outside [`SensorType`]).
    pub sensor_type: String,
    /// Opaque identifier of the physical or logical sensor instance.
    pub sensor_instance_id: String,
    /// Measured value.
    pub value: f64,
    /// Unit derived from `sensor_type`; never supplied by the sensor.
    pub unit: String,
    /// Ingestion time (UTC), assigned by the receiving process.
    pub timestamp: DateTime<Utc>,
}

/// A structured record published to every connected live viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    /// Event name (e.g. [`READING_EVENT`]).
    pub event: String,
    /// The reading being announced.
    pub reading: SensorReading,
}

impl LiveEvent {
    /// Wraps a reading in a [`READING_EVENT`] envelope.
    pub fn reading(reading: SensorReading) -> Self {
        Self {
            event: READING_EVENT.to_string(),
            reading,
        }
    }
}
