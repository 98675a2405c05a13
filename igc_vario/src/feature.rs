//! Climb-only GeoJSON points from averaged fixes and vario.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use serde::{Deserialize, Serialize};

use crate::average::AveragedSeries;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarioSample {
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i64,
    pub enl: Option<u32>,
    pub vario: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl VarioSample {
    pub fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        // half away from zero, so 0.125 becomes 0.13 rather than 0.12
        properties.insert("vario".to_string(), JsonValue::from(round2(self.vario)));
        properties.insert(
            "enl".to_string(),
            self.enl.map(JsonValue::from).unwrap_or(JsonValue::Null),
        );
        properties.insert("time".to_string(), JsonValue::from(self.timestamp));

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                self.longitude,
                self.latitude,
                self.altitude as f64,
            ]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Zip averaged fixes with their vario and keep only climbing points.
///
/// `enl` is the unaveraged, filtered per-fix sequence and is read by position:
/// averaged point `i` takes `enl[i]`, not the ENL of the fixes in its block.
/// The output stops at the shortest of the inputs.
pub fn assemble(averaged: &AveragedSeries, vario: &[f64], enl: &[Option<u32>]) -> Vec<VarioSample> {
    averaged
        .timestamps
        .iter()
        .zip(vario)
        .zip(&averaged.latitudes)
        .zip(&averaged.longitudes)
        .zip(&averaged.altitudes)
        .zip(enl)
        .filter(|(((((_, v), _), _), _), _)| **v >= 0.0)
        .map(|(((((&t, &v), &lat), &lon), &alt), &enl)| VarioSample {
            timestamp: t as i64,
            latitude: lat,
            longitude: lon,
            altitude: alt as i64,
            enl,
            vario: v,
        })
        .collect()
}

pub fn feature_collection<'a, I>(samples: I) -> FeatureCollection
where
    I: IntoIterator<Item = &'a VarioSample>,
{
    FeatureCollection {
        bbox: None,
        features: samples.into_iter().map(VarioSample::to_feature).collect(),
        foreign_members: None,
    }
}
