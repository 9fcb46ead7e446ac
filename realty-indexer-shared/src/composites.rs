//! Nested sub-objects carried from the source payload into Gold documents.
//!
//! A `Nested<T>` keeps the source object exactly as it arrived and decodes a
//! typed view `T` next to it for reading. Only the raw object is serialized,
//! so integers stay integers and unknown keys survive. View fields are
//! lenient: a value of an unexpected type leaves that field unset instead of
//! failing the whole view.

use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A source sub-object plus its typed view.
#[derive(Debug, Clone, PartialEq)]
pub struct Nested<T> {
    raw: Map<String, Value>,
    view: T,
}

impl<T> Nested<T>
where
    T: DeserializeOwned + Default,
{
    pub fn new(raw: Map<String, Value>) -> Self {
        let view = serde_json::from_value(Value::Object(raw.clone())).unwrap_or_default();
        Self { raw, view }
    }

    /// Wrap `value` when it is an object.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match value {
            Some(Value::Object(map)) => Some(Self::new(map.clone())),
            _ => None,
        }
    }
}

impl<T> Nested<T> {
    /// The object as the source wrote it.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn view(&self) -> &T {
        &self.view
    }
}

impl<T> Deref for Nested<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.view
    }
}

impl<T> Serialize for Nested<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Nested<T>
where
    T: DeserializeOwned + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::new)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    #[serde(default, deserialize_with = "lenient::string")]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub county: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state: Option<String>,
    #[serde(default, alias = "zip_code", deserialize_with = "lenient::string")]
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(
        default,
        alias = "lat",
        deserialize_with = "lenient::f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub latitude: Option<f64>,
    #[serde(
        default,
        alias = "lng",
        alias = "lon",
        deserialize_with = "lenient::f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub longitude: Option<f64>,
}

impl Coordinates {
    /// `[lon, lat]` pair, the order geo fields expect.
    pub fn lon_lat(&self) -> Option<[f64; 2]> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some([lon, lat]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PropertyDetails {
    #[serde(default, deserialize_with = "lenient::f64")]
    pub square_feet: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub bedrooms: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub bathrooms: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub property_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub year_built: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub lot_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub stories: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub garage_spaces: Option<f64>,
}

/// Parking block assembled from a garage-space count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parking {
    pub spaces: u32,
    pub garage: bool,
}

impl Parking {
    /// Build the parking block; `None` when the count is unknown or negative.
    pub fn from_garage_spaces(garage_spaces: Option<f64>) -> Option<Self> {
        let spaces = garage_spaces.filter(|n| n.is_finite() && *n >= 0.0)?;
        let spaces = spaces.round() as u32;
        Some(Self {
            spaces,
            garage: spaces > 0,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Demographics {
    #[serde(default, deserialize_with = "lenient::f64")]
    pub population: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub median_household_income: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub median_age: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchoolRatings {
    #[serde(default, deserialize_with = "lenient::f64")]
    pub elementary: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub middle: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub high: Option<f64>,
}

/// Decode a composite from a nested value. Non-object values yield `None`.
pub fn decode<T>(value: Option<&Value>) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
{
    match value {
        Some(v @ Value::Object(_)) => serde_json::from_value(v.clone()).ok(),
        _ => None,
    }
}

/// Numeric and string coercions shared by the composites and the enricher.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn as_f64(value: &Value) -> Option<f64> {
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        };
        number.filter(|n| n.is_finite())
    }

    pub fn as_string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(as_f64))
    }

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(as_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_serializes_source_object_unchanged() {
        let raw = json!({
            "street": { "line1": "1 Main St", "line2": "Unit 4B" },
            "city": "Park City",
            "state": "UT",
            "zip": 84060,
            "county": "  "
        });

        let address: Nested<Address> = Nested::from_value(Some(&raw)).unwrap();
        assert_eq!(address.city.as_deref(), Some("Park City"));
        assert_eq!(address.zip.as_deref(), Some("84060"));
        assert_eq!(address.street, None);
        assert_eq!(address.county, None);

        assert_eq!(serde_json::to_value(&address).unwrap(), raw);
    }

    #[test]
    fn test_property_details_view_is_lenient() {
        let raw = json!({"square_feet": "1,850", "bedrooms": 3, "bathrooms": 2.5, "garage_spaces": "x"});
        let details: Nested<PropertyDetails> = Nested::from_value(Some(&raw)).unwrap();

        assert_eq!(details.square_feet, Some(1850.0));
        assert_eq!(details.bedrooms, Some(3.0));
        assert_eq!(details.bathrooms, Some(2.5));
        assert_eq!(details.garage_spaces, None);
        assert_eq!(serde_json::to_value(&details).unwrap(), raw);
    }

    #[test]
    fn test_nested_round_trips_through_deserialize() {
        let raw = json!({"population": 8500, "age_brackets": {"18-34": 0.3}});
        let demographics: Nested<Demographics> = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(demographics.population, Some(8500.0));
        assert_eq!(demographics.raw()["population"], json!(8500));
        assert_eq!(serde_json::to_value(&demographics).unwrap(), raw);
    }

    #[test]
    fn test_coordinates_aliases_and_lon_lat_order() {
        let raw = json!({"lat": 40.64, "lng": -111.49});
        let coords: Coordinates = decode(Some(&raw)).unwrap();
        assert_eq!(coords.lon_lat(), Some([-111.49, 40.64]));

        let partial = Coordinates {
            latitude: Some(1.0),
            longitude: None,
        };
        assert_eq!(partial.lon_lat(), None);
    }

    #[test]
    fn test_parking_from_garage_spaces() {
        assert_eq!(
            Parking::from_garage_spaces(Some(2.0)),
            Some(Parking {
                spaces: 2,
                garage: true
            })
        );
        assert_eq!(
            Parking::from_garage_spaces(Some(0.0)),
            Some(Parking {
                spaces: 0,
                garage: false
            })
        );
        assert_eq!(Parking::from_garage_spaces(None), None);
        assert_eq!(Parking::from_garage_spaces(Some(-1.0)), None);
    }

    #[test]
    fn test_non_objects_are_not_wrapped() {
        assert!(Nested::<Address>::from_value(Some(&json!("1 Main St"))).is_none());
        assert!(Nested::<Address>::from_value(None).is_none());
        assert!(decode::<Coordinates>(Some(&json!([1.0, 2.0]))).is_none());
    }
}
