use crate::value::number_to_json;
use metaform_template::UnitSpec;
use serde_json::{Map, Value as Json};

/// Pair a numeric answer with its unit.
///
/// Bare numbers (and numeric strings) get the default unit. An answer that
/// already names a unit, as an object or as `"<number> <unit>"`, is kept as
/// given. Anything else passes through untouched.
pub fn pair_with_unit(value: &Json, units: &UnitSpec) -> Json {
    let Some(default_unit) = units.default_unit() else {
        return value.clone();
    };

    match value {
        Json::Number(_) => paired(value.clone(), default_unit),
        Json::String(text) => match split_quantity(text) {
            Some((number, None)) => paired(number_to_json(number), default_unit),
            Some((number, Some(unit))) => paired(number_to_json(number), unit),
            None => value.clone(),
        },
        Json::Object(map) if map.contains_key("unit") => value.clone(),
        Json::Object(map) => match map.get("value") {
            Some(inner) => {
                let mut map = map.clone();
                map.insert("unit".to_string(), Json::String(default_unit.to_string()));
                if let Json::String(text) = inner {
                    if let Some((number, None)) = split_quantity(text) {
                        map.insert("value".to_string(), number_to_json(number));
                    }
                }
                Json::Object(map)
            }
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

fn paired(number: Json, unit: &str) -> Json {
    let mut map = Map::new();
    map.insert("value".to_string(), number);
    map.insert("unit".to_string(), Json::String(unit.to_string()));
    Json::Object(map)
}

/// `"12.5"` -> (12.5, None), `"12.5 mg"` -> (12.5, Some("mg"))
fn split_quantity(text: &str) -> Option<(f64, Option<&str>)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .unwrap_or(text.len());
    let number = text[..split].trim().parse::<f64>().ok()?;
    let unit = text[split..].trim();
    Some((number, (!unit.is_empty()).then_some(unit)))
}
