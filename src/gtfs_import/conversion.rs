//! Cell value conversion.
//!
//! Empty GTFS cells arrive as `None` (see `GtfsRow::get`), so every
//! converter takes an `Option<&str>`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::WGS_84_SRID;

/// Rounds fractional values ("1.0", "2.6"); anything unparsable is absent.
pub fn to_int(value: Option<&str>) -> Option<i32> {
    let parsed = value?.trim().parse::<f64>().ok()?;

    if !parsed.is_finite() {
        return None;
    }

    let rounded = parsed.round();

    if rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return None;
    }

    Some(rounded as i32)
}

pub fn to_text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

pub fn to_opt_text(value: Option<&str>) -> Option<String> {
    value.map(|s| s.to_string())
}

/// GTFS dates are `YYYYMMDD`.
pub fn to_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();

    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveDate::parse_from_str(value, "%Y%m%d").ok()
}

pub fn to_decimal(value: Option<&str>) -> Option<Decimal> {
    Decimal::from_str(value?.trim()).ok()
}

/// `H:MM:SS` to seconds after midnight of the service day. Hours may exceed
/// 23 for trips running past midnight.
pub fn to_seconds(value: Option<&str>) -> Option<i32> {
    let mut parts = value?.trim().split(':');

    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next()?.parse().ok()?;
    let seconds: i32 = parts.next()?.parse().ok()?;

    if parts.next().is_some()
        || hours < 0
        || !(0..60).contains(&minutes)
        || !(0..60).contains(&seconds)
    {
        return None;
    }

    hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)
}

/// GTFS lists latitude first, PostGIS wants x = longitude.
pub fn to_point(latitude: Option<&str>, longitude: Option<&str>) -> Option<postgis_diesel::types::Point> {
    let latitude = latitude?.trim().parse::<f64>().ok()?;
    let longitude = longitude?.trim().parse::<f64>().ok()?;

    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }

    Some(postgis_diesel::types::Point {
        x: longitude,
        y: latitude,
        srid: Some(WGS_84_SRID),
    })
}

/// Number of significant digits and of decimal places, the way a
/// `NUMERIC(precision, scale)` column counts them.
pub fn decimal_digits(value: &Decimal) -> (u32, u32) {
    let mantissa = value.mantissa().unsigned_abs();
    let digits = if mantissa == 0 {
        1
    } else {
        mantissa.to_string().len() as u32
    };

    (digits.max(value.scale()), value.scale())
}
