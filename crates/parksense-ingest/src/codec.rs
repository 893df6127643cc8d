//! Transport message to [`SensorReading`] decoding.

use chrono::{DateTime, Utc};
use parksense_types::{unit_for, SensorReading, TOPIC_CATEGORY, TOPIC_NAMESPACE, TOPIC_SEGMENTS};

use crate::error::RejectReason;

/// Parses one transport message into a validated reading.
///
/// The topic must be exactly `parking/sensor/<sensorType>/<sensorInstanceId>`
/// with non-empty type and instance segments. The payload must be a UTF-8
/// finite decimal number with `.` as decimal point; surrounding whitespace
/// is ignored. `received_at` becomes the reading's timestamp.
///
/// Unknown sensor types are accepted with an empty unit.
pub fn parse(
    topic: &str,
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> Result<SensorReading, RejectReason> {
    let segments: Vec<&str> = topic.split('/').collect();
    let [namespace, category, sensor_type, sensor_instance_id] = segments[..] else {
        return Err(RejectReason::InvalidTopic(format!(
            "expected {TOPIC_SEGMENTS} segments, got {}",
            segments.len()
        )));
    };

    if namespace != TOPIC_NAMESPACE || category != TOPIC_CATEGORY {
        return Err(RejectReason::InvalidTopic(format!(
            "expected prefix {TOPIC_NAMESPACE}/{TOPIC_CATEGORY}, got {namespace}/{category}"
        )));
    }
    if sensor_type.is_empty() || sensor_instance_id.is_empty() {
        return Err(RejectReason::InvalidTopic(
            "sensor type and instance id must be non-empty".to_string(),
        ));
    }

    let value = parse_value(payload)?;

    Ok(SensorReading {
        sensor_type: sensor_type.to_string(),
        sensor_instance_id: sensor_instance_id.to_string(),
        value,
        unit: unit_for(sensor_type).to_string(),
        timestamp: received_at,
    })
}

fn parse_value(payload: &[u8]) -> Result<f64, RejectReason> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| RejectReason::InvalidPayload("payload is not UTF-8".to_string()))?
        .trim();

    let value: f64 = text
        .parse()
        .map_err(|_| RejectReason::InvalidPayload(format!("not a number: {text:?}")))?;

    // `f64::from_str` also accepts "inf" and "NaN".
    if !value.is_finite() {
        return Err(RejectReason::InvalidPayload(format!(
            "not a finite number: {text:?}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn accepts_temperature_reading() {
        let reading = parse("parking/sensor/temperature/temp_sensor_1", b"21.5", at()).unwrap();
        assert_eq!(reading.sensor_type, "temperature");
        assert_eq!(reading.sensor_instance_id, "temp_sensor_1");
        assert_eq!(reading.value, 21.5);
        assert_eq!(reading.unit, "°C");
        assert_eq!(reading.timestamp, at());
    }

    #[test]
    fn accepts_numeric_forms() {
        let cases: [(&[u8], f64); 7] = [
            (b"5", 5.0),
            (b"-3", -3.0),
            (b"0.25", 0.25),
            (b" 42.0\n", 42.0),
            (b"1e3", 1000.0),
            (b"+7.5", 7.5),
            (b"-0.001", -0.001),
        ];
        for (payload, expected) in cases {
            let reading = parse("parking/sensor/occupancy/bay_1", payload, at()).unwrap();
            assert_eq!(reading.value, expected, "payload {payload:?}");
        }
    }

    #[test]
    fn unknown_type_has_empty_unit() {
        let reading = parse("parking/sensor/radiation/geiger_1", b"0.12", at()).unwrap();
        assert_eq!(reading.unit, "");
        assert_eq!(reading.sensor_type, "radiation");
    }

    #[test]
    fn rejects_malformed_topics() {
        for topic in [
            "bad/topic",
            "parking/sensor/temperature",
            "parking/sensor/temperature/temp_1/extra",
            "garage/sensor/temperature/temp_1",
            "parking/actuator/temperature/temp_1",
            "parking/sensor//temp_1",
            "parking/sensor/temperature/",
            "",
        ] {
            assert!(
                matches!(parse(topic, b"5", at()), Err(RejectReason::InvalidTopic(_))),
                "topic {topic:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_numeric_payloads() {
        for payload in [
            &b"abc"[..],
            b"",
            b"21,5",
            b"21.5C",
            b"NaN",
            b"inf",
            b"-infinity",
            &[0xff_u8, 0xfe][..],
        ] {
            assert!(
                matches!(
                    parse("parking/sensor/temperature/t1", payload, at()),
                    Err(RejectReason::InvalidPayload(_))
                ),
                "payload {payload:?} should be rejected"
            );
        }
    }

    #[test]
    fn topic_checked_before_payload() {
        assert!(matches!(
            parse("bad/topic", b"not a number", at()),
            Err(RejectReason::InvalidTopic(_))
        ));
    }
}
