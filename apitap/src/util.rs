use crate::{data::HeaderList, error::Error};
use hyper::{
    header::{HeaderName, HeaderValue},
    HeaderMap,
};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

pub fn extract_headers(header_map: &HeaderMap) -> HeaderList {
    // it currently ignores header values with opaque characters
    header_map
        .iter()
        .map(|(k, v)| (k.as_str(), v.to_str()))
        .filter_map(|(key, value)| value.ok().map(|v| (key, v)))
        .collect()
}

pub fn put_headers<'a, I: IntoIterator<Item = (&'a String, &'a String)>>(
    header_map: &mut HeaderMap<HeaderValue>,
    headers: I,
) -> Result<(), Error> {
    for (key, value) in headers {
        let header_name = HeaderName::from_lowercase(key.to_lowercase().as_bytes())?;
        let header_value = HeaderValue::from_str(value)?;
        header_map.append(header_name, header_value);
    }

    Ok(())
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Whole milliseconds since `start`, rounded to nearest.
pub fn elapsed_millis(start: Instant) -> u64 {
    let micros = start.elapsed().as_micros();
    ((micros + 500) / 1000) as u64
}
