use weather_protocol::payload::{self, Attributes};

/// Minimal station with only its id.
pub fn station(id: &str) -> StationBuilder {
    StationBuilder::new(id)
}

/// Builds station readings like the ones real producers send.
#[derive(Debug, Clone)]
pub struct StationBuilder {
    attributes: Attributes,
}

impl StationBuilder {
    pub fn new(id: &str) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("id".to_string(), id.to_string());
        Self { attributes }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Typical weather fields, so payloads are not trivially small.
    pub fn adelaide(self) -> Self {
        self.with("name", "Adelaide (West Terrace /  ngayirdapira)")
            .with("state", "SA")
            .with("time_zone", "CST")
            .with("lat", "-34.9")
            .with("lon", "138.6")
            .with("local_date_time_full", "20230715160000")
            .with("air_temp", "13.3")
            .with("apparent_t", "9.5")
            .with("cloud", "Partly cloudy")
            .with("dewpt", "5.7")
            .with("press", "1023.9")
            .with("rel_hum", "60")
            .with("wind_dir", "S")
            .with("wind_spd_kmh", "15")
    }

    pub fn build(self) -> Attributes {
        self.attributes
    }

    pub fn to_json(&self) -> Vec<u8> {
        payload::encode_reading(&self.attributes)
    }

    /// Station file in the `key: value` line format.
    pub fn to_station_file(&self) -> String {
        self.attributes
            .iter()
            .map(|(k, v)| format!("{k}: {v}\n"))
            .collect()
    }
}
