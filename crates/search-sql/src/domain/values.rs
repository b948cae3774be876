//! Parsing of parameter values into node values.

use crate::cache::DEFAULT_TOKEN_SYSTEM;
use crate::error::{SearchError, SearchResult};
use crate::range::decimal_bounds;
use crate::types::{SearchParameter, SearchValue};

use super::node::{BoundingBox, QuantityValue, RangeValue, TokenMatch};

/// Kilometres per degree of latitude.
const KM_PER_DEGREE: f64 = 111.0;
/// Kilometres per statute mile.
const KM_PER_MILE: f64 = 1.609;

/// Parses `code`, `system|code`, `|code` or `system|`.
pub(crate) fn parse_token(param: &str, value: &str) -> SearchResult<TokenMatch> {
    match value.split_once('|') {
        None if value.is_empty() => Err(SearchError::invalid_value(param, value, "empty token")),
        None => Ok(TokenMatch::Code(value.to_string())),
        Some(("", "")) => Err(SearchError::invalid_value(
            param,
            value,
            "token needs a system or a code",
        )),
        Some(("", code)) => Ok(TokenMatch::SystemCode {
            system: DEFAULT_TOKEN_SYSTEM.to_string(),
            code: code.to_string(),
        }),
        Some((system, "")) => Ok(TokenMatch::System(system.to_string())),
        Some((system, code)) => Ok(TokenMatch::SystemCode {
            system: system.to_string(),
            code: code.to_string(),
        }),
    }
}

/// Parses `number|system|code`; empty system or code means "any".
pub(crate) fn parse_quantity(param: &str, value: &SearchValue) -> SearchResult<QuantityValue> {
    let mut parts = value.value.splitn(3, '|');
    let number = parts.next().unwrap_or_default();
    let system = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    let unit = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

    Ok(QuantityValue {
        range: RangeValue {
            prefix: value.prefix,
            bounds: decimal_bounds(param, number)?,
        },
        system,
        unit,
    })
}

/// Parses `latitude|longitude|distance|unit` into a bounding box.
///
/// Distance defaults to zero and the unit to kilometres; `mi` and `[mi_i]`
/// are miles, `m` is metres.
pub(crate) fn parse_near(param: &str, value: &str) -> SearchResult<BoundingBox> {
    let invalid = |message: String| SearchError::invalid_value(param, value, message);
    let parts: Vec<&str> = value.split('|').map(str::trim).collect();
    if !(2..=4).contains(&parts.len()) {
        return Err(invalid(
            "expected latitude|longitude|distance|unit".to_string(),
        ));
    }

    let number = |text: &str, what: &str| {
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(format!("{} is not a number", what)))
    };

    let lat = number(parts[0], "latitude")?;
    let lng = number(parts[1], "longitude")?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(invalid("latitude must be between -90 and 90".to_string()));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(invalid("longitude must be between -180 and 180".to_string()));
    }

    let distance = match parts.get(2) {
        Some(d) if !d.is_empty() => number(d, "distance")?,
        _ => 0.0,
    };
    if distance < 0.0 {
        return Err(invalid("distance must not be negative".to_string()));
    }

    let km = match parts.get(3).copied() {
        None | Some("") | Some("km") => distance,
        Some("mi") | Some("[mi_i]") => distance * KM_PER_MILE,
        Some("m") => distance / 1000.0,
        Some(other) => return Err(invalid(format!("unsupported distance unit '{}'", other))),
    };

    let delta_lat = km / KM_PER_DEGREE;
    let cos = lat.to_radians().cos().abs();
    let delta_lng = if cos < 1e-9 {
        180.0
    } else {
        km / (KM_PER_DEGREE * cos)
    };

    Ok(BoundingBox {
        min_lat: (lat - delta_lat).max(-90.0),
        max_lat: (lat + delta_lat).min(90.0),
        min_lng: (lng - delta_lng).max(-180.0),
        max_lng: (lng + delta_lng).min(180.0),
    })
}

/// Reads the `:missing` flag. Returns `None` when the values disagree.
pub(crate) fn missing_flag(param: &SearchParameter) -> SearchResult<Option<bool>> {
    let mut flag = None;
    for value in &param.values {
        let parsed = match value.value.to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => {
                return Err(SearchError::invalid_value(
                    &param.name,
                    &value.value,
                    "missing expects true or false",
                ));
            }
        };
        match flag {
            Some(previous) if previous != parsed => return Ok(None),
            _ => flag = Some(parsed),
        }
    }
    Ok(flag)
}

/// Splits the `_type` values of a whole-system search.
pub(crate) fn type_list(param: &SearchParameter) -> Vec<String> {
    param
        .values
        .iter()
        .flat_map(|v| v.value.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resource type names end up in table names and literals.
pub(crate) fn validate_type_name(name: &str) -> SearchResult<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(SearchError::InvalidRequest {
            message: format!("invalid resource type name '{}'", name),
        })
    }
}

/// Ancestor paths of a URI, nearest first: `http://a.org/x/y` gives
/// `http://a.org/x` and `http://a.org`.
pub(crate) fn uri_ancestors(uri: &str) -> Vec<String> {
    let authority_start = uri.find("://").map(|i| i + 3).unwrap_or(0);
    let mut ancestors = Vec::new();
    let mut current = uri.trim_end_matches('/');
    while let Some(slash) = current.rfind('/') {
        if slash < authority_start {
            break;
        }
        current = &current[..slash];
        if current.len() <= authority_start {
            break;
        }
        ancestors.push(current.to_string());
    }
    ancestors
}
