//! Plain-text rendering of query results.

use weather_protocol::{Attributes, ID_ATTRIBUTE};

pub const NO_DATA: &str = "No weather data available.";
const RULE: &str = "----------------------------------------";

/// Keeps only the readings of `station`, or all of them when `None`.
pub fn filter_station(readings: Vec<Attributes>, station: Option<&str>) -> Vec<Attributes> {
    match station {
        Some(station) => readings
            .into_iter()
            .filter(|r| r.get(ID_ATTRIBUTE).is_some_and(|id| id == station))
            .collect(),
        None => readings,
    }
}

/// `key: value` lines, `id` first, readings separated by a dashed rule.
pub fn render(readings: &[Attributes]) -> String {
    if readings.is_empty() {
        return format!("{NO_DATA}\n");
    }

    let mut out = String::new();
    for (i, reading) in readings.iter().enumerate() {
        if i > 0 {
            out.push_str(RULE);
            out.push('\n');
        }
        if let Some(id) = reading.get(ID_ATTRIBUTE) {
            out.push_str(&format!("{ID_ATTRIBUTE}: {id}\n"));
        }
        for (key, value) in reading.iter().filter(|(key, _)| key.as_str() != ID_ATTRIBUTE) {
            out.push_str(&format!("{key}: {value}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_render_puts_id_first() {
        let out = render(&[reading(&[("air_temp", "13.3"), ("id", "S1"), ("name", "Adelaide")])]);
        assert_eq!(out, "id: S1\nair_temp: 13.3\nname: Adelaide\n");
    }

    #[test]
    fn test_render_separates_readings() {
        let out = render(&[reading(&[("id", "S1")]), reading(&[("id", "S2")])]);
        assert_eq!(out, format!("id: S1\n{RULE}\nid: S2\n"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "No weather data available.\n");
    }

    #[test]
    fn test_filter_station() {
        let readings = vec![reading(&[("id", "S1")]), reading(&[("id", "S2")])];
        let only = filter_station(readings.clone(), Some("S2"));
        assert_eq!(only, vec![reading(&[("id", "S2")])]);
        assert!(filter_station(readings.clone(), Some("S9")).is_empty());
        assert_eq!(filter_station(readings, None).len(), 2);
    }
}
