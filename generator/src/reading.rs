use rand::Rng;
use serde::{Deserialize, Serialize};

/// Named locations a shipment can move between. `route_to` is redrawn until
/// it differs from `route_from`, so the list must hold at least two entries.
pub const ROUTES: [&str; 6] = [
    "Bengaluru, India",
    "New York, USA",
    "Pune, India",
    "London, UK",
    "Hyderabad, India",
    "Louisville, USA",
];

pub const READINGS_PER_BATCH: usize = 2;

/// One sensor sample. Field names on the wire follow the device protocol
/// and are read as-is by the downstream query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    #[serde(rename = "Battery_Level")]
    pub battery_level: f64,
    #[serde(rename = "Device_Id")]
    pub device_id: u32,
    #[serde(rename = "First_Sensor_temperature")]
    pub sensor_temperature: f64,
    #[serde(rename = "Route_From")]
    pub route_from: String,
    #[serde(rename = "Route_To")]
    pub route_to: String,
}

impl DeviceReading {
    pub fn sample(rng: &mut impl Rng) -> Self {
        assert!(
            ROUTES.len() >= 2,
            "route list must hold at least two entries"
        );

        let route_from = ROUTES[rng.gen_range(0..ROUTES.len())];
        let mut route_to = ROUTES[rng.gen_range(0..ROUTES.len())];
        while route_to == route_from {
            route_to = ROUTES[rng.gen_range(0..ROUTES.len())];
        }

        Self {
            battery_level: round_to(rng.gen_range(2.00..=5.00), 100.0),
            device_id: rng.gen_range(1156053075..=1156053080),
            sensor_temperature: round_to(rng.gen_range(10.0..=40.0), 10.0),
            route_from: route_from.to_string(),
            route_to: route_to.to_string(),
        }
    }
}

/// Draws the batch emitted on one generation tick.
pub fn generate_batch(rng: &mut impl Rng) -> Vec<DeviceReading> {
    (0..READINGS_PER_BATCH)
        .map(|_| DeviceReading::sample(rng))
        .collect()
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_hold_two_readings_with_distinct_routes() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let batch = generate_batch(&mut rng);
            assert_eq!(batch.len(), READINGS_PER_BATCH);
            for reading in &batch {
                assert_ne!(reading.route_from, reading.route_to);
            }
        }
    }

    #[test]
    fn sampled_values_stay_in_generator_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let r = DeviceReading::sample(&mut rng);
            assert!((2.0..=5.0).contains(&r.battery_level), "{}", r.battery_level);
            assert!(
                (10.0..=40.0).contains(&r.sensor_temperature),
                "{}",
                r.sensor_temperature
            );
            assert!((1156053075..=1156053080).contains(&r.device_id));
            assert!(ROUTES.contains(&r.route_from.as_str()));
            assert!(ROUTES.contains(&r.route_to.as_str()));
        }
    }

    #[test]
    fn values_round_to_wire_precision() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let r = DeviceReading::sample(&mut rng);
            let battery_cents = r.battery_level * 100.0;
            assert!((battery_cents - battery_cents.round()).abs() < 1e-6);
            let temp_tenths = r.sensor_temperature * 10.0;
            assert!((temp_tenths - temp_tenths.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn wire_field_names_match_device_protocol() {
        let reading = DeviceReading::sample(&mut rand::thread_rng());
        let value = serde_json::to_value(&reading).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "Battery_Level",
            "Device_Id",
            "First_Sensor_temperature",
            "Route_From",
            "Route_To",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object.len(), 5);
    }

    #[test]
    fn wire_round_trip_preserves_fields() {
        let batch = generate_batch(&mut rand::thread_rng());
        let encoded = serde_json::to_string(&batch).unwrap();
        let decoded: Vec<DeviceReading> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, batch);
    }
}
