use crate::error::ParseError;

/// Minimum number of `;`-separated fields in a reply from a running inverter.
pub const MIN_FIELDS: usize = 8;

const SERIAL_LENGTH: usize = 16;

/// One decoded status page.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub serial_number: String,
    pub firmware_version: String,
    pub inverter_model: String,
    pub temperature: f64,
    pub instant_power_watts: i64,
    pub energy_today_kwh: f64,
    pub energy_total_kwh: f64,
    pub alerts: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Reading(PollResult),
    /// Too few fields: the inverter is asleep or not producing.
    Offline,
}

/// Parses the raw status page.
///
/// Layout: `serial;firmware;model;temperature;power;kwh_today;kwh_total;alerts`.
/// The serial field carries a prefix, only its last 16 characters are kept.
pub fn parse(raw: &[u8]) -> Result<ParsedResponse, ParseError> {
    let text = decode_latin1(raw);
    let fields: Vec<&str> = text.split(';').collect();

    if fields.len() < MIN_FIELDS {
        tracing::debug!(fields = fields.len(), "Inverter reply too short, treating as offline");
        return Ok(ParsedResponse::Offline);
    }

    let power = parse_number(&fields, 4)?;

    Ok(ParsedResponse::Reading(PollResult {
        serial_number: last_chars(fields[0], SERIAL_LENGTH),
        firmware_version: fields[1].to_string(),
        inverter_model: fields[2].to_string(),
        temperature: parse_number(&fields, 3)?,
        instant_power_watts: power.round_ties_even() as i64,
        energy_today_kwh: parse_number(&fields, 5)?,
        energy_total_kwh: parse_number(&fields, 6)?,
        alerts: fields[7].to_string(),
    }))
}

/// ISO-8859-1 maps every byte straight onto the code point of the same value.
fn decode_latin1(raw: &[u8]) -> String {
    raw.iter().map(|&b| char::from(b)).collect()
}

fn last_chars(value: &str, count: usize) -> String {
    let skip = value.chars().count().saturating_sub(count);
    value.chars().skip(skip).collect()
}

fn parse_number(fields: &[&str], index: usize) -> Result<f64, ParseError> {
    let raw = fields[index];
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidNumber {
            field: index,
            value: raw.to_string(),
        }),
    }
}
