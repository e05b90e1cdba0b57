//! FDSN StationXML parsing.
//!
//! Only the parts needed for acquisition and response removal are modelled:
//! network/station/channel codes and epochs, coordinates, overall instrument
//! sensitivity, and per-stage poles/zeros and gains. Everything else in the
//! document is ignored.

use crate::error::{Result, SeismoError};
use crate::models::{
    Channel, ChannelResponse, Inventory, Network, PolesZeros, ResponseStage, Sensitivity,
    StageGain, StageTransfer, Station, TransferFunction,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use rustfft::num_complex::Complex64;
use serde::Deserialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Serde structures for StationXML deserialization
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FdsnStationXml {
    #[serde(rename = "Network", default)]
    networks: Vec<XmlNetwork>,
}

#[derive(Deserialize)]
struct XmlNetwork {
    #[serde(rename = "@code")]
    code: String,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Station", default)]
    stations: Vec<XmlStation>,
}

#[derive(Deserialize)]
struct XmlStation {
    #[serde(rename = "@code")]
    code: String,
    #[serde(rename = "Latitude")]
    latitude: XmlFloat,
    #[serde(rename = "Longitude")]
    longitude: XmlFloat,
    #[serde(rename = "Elevation")]
    elevation: XmlFloat,
    #[serde(rename = "Site", default)]
    site: Option<XmlSite>,
    #[serde(rename = "Channel", default)]
    channels: Vec<XmlChannel>,
}

#[derive(Deserialize)]
struct XmlSite {
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct XmlChannel {
    #[serde(rename = "@code")]
    code: String,
    #[serde(rename = "@locationCode", default)]
    location_code: String,
    #[serde(rename = "@startDate", default)]
    start_date: Option<String>,
    #[serde(rename = "@endDate", default)]
    end_date: Option<String>,
    #[serde(rename = "SampleRate", default)]
    sample_rate: Option<XmlFloat>,
    #[serde(rename = "Response", default)]
    response: Option<XmlResponse>,
}

#[derive(Deserialize)]
struct XmlResponse {
    #[serde(rename = "InstrumentSensitivity", default)]
    sensitivity: Option<XmlSensitivity>,
    #[serde(rename = "Stage", default)]
    stages: Vec<XmlStage>,
}

#[derive(Deserialize)]
struct XmlSensitivity {
    #[serde(rename = "Value")]
    value: XmlFloat,
    #[serde(rename = "Frequency")]
    frequency: XmlFloat,
    #[serde(rename = "InputUnits")]
    input_units: XmlUnits,
    #[serde(rename = "OutputUnits")]
    output_units: XmlUnits,
}

#[derive(Deserialize)]
struct XmlUnits {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Deserialize)]
struct XmlStage {
    #[serde(rename = "@number")]
    number: u32,
    #[serde(rename = "PolesZeros", default)]
    poles_zeros: Option<XmlPolesZeros>,
    #[serde(rename = "Coefficients", default)]
    coefficients: Option<XmlFilter>,
    #[serde(rename = "FIR", default)]
    fir: Option<XmlFilter>,
    #[serde(rename = "StageGain", default)]
    gain: Option<XmlGain>,
}

#[derive(Deserialize)]
struct XmlFilter {
    #[serde(rename = "InputUnits", default)]
    input_units: Option<XmlUnits>,
    #[serde(rename = "OutputUnits", default)]
    output_units: Option<XmlUnits>,
}

#[derive(Deserialize)]
struct XmlPolesZeros {
    #[serde(rename = "InputUnits", default)]
    input_units: Option<XmlUnits>,
    #[serde(rename = "OutputUnits", default)]
    output_units: Option<XmlUnits>,
    #[serde(rename = "PzTransferFunctionType")]
    transfer_function: String,
    #[serde(rename = "NormalizationFactor", default)]
    normalization_factor: Option<XmlFloat>,
    #[serde(rename = "NormalizationFrequency", default)]
    normalization_frequency: Option<XmlFloat>,
    #[serde(rename = "Zero", default)]
    zeros: Vec<XmlPoleZero>,
    #[serde(rename = "Pole", default)]
    poles: Vec<XmlPoleZero>,
}

#[derive(Deserialize)]
struct XmlPoleZero {
    #[serde(rename = "Real")]
    real: XmlFloat,
    #[serde(rename = "Imaginary")]
    imaginary: XmlFloat,
}

#[derive(Deserialize)]
struct XmlGain {
    #[serde(rename = "Value")]
    value: XmlFloat,
    #[serde(rename = "Frequency")]
    frequency: XmlFloat,
}

/// Float element that may carry uncertainty attributes
#[derive(Deserialize)]
struct XmlFloat {
    #[serde(rename = "$text")]
    value: f64,
}

// ---------------------------------------------------------------------------
// Conversion into the domain model
// ---------------------------------------------------------------------------

/// Parse a StationXML date; a missing zone means UTC
pub(crate) fn parse_xml_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|t| t.and_utc())
}

fn transfer_function(name: &str) -> Result<TransferFunction> {
    let upper = name.to_ascii_uppercase();
    if upper.contains("RADIANS") {
        Ok(TransferFunction::LaplaceRadians)
    } else if upper.contains("HERTZ") {
        Ok(TransferFunction::LaplaceHertz)
    } else if upper.contains("DIGITAL") {
        Ok(TransferFunction::Digital)
    } else {
        Err(SeismoError::StationDiscovery {
            reason: format!("unknown PzTransferFunctionType '{}'", name),
        })
    }
}

fn convert_stage(stage: XmlStage) -> Result<ResponseStage> {
    let gain = stage.gain.map(|g| StageGain {
        value: g.value.value,
        frequency: g.frequency.value,
    });

    let (transfer, input_units, output_units) = if let Some(pz) = stage.poles_zeros {
        let to_complex = |p: &XmlPoleZero| Complex64::new(p.real.value, p.imaginary.value);
        let transfer = StageTransfer::PolesZeros(PolesZeros {
            function: transfer_function(&pz.transfer_function)?,
            normalization_factor: pz.normalization_factor.map_or(1.0, |f| f.value),
            normalization_frequency: pz.normalization_frequency.map_or(1.0, |f| f.value),
            zeros: pz.zeros.iter().map(to_complex).collect(),
            poles: pz.poles.iter().map(to_complex).collect(),
        });
        (transfer, pz.input_units, pz.output_units)
    } else if let Some(fir) = stage.fir {
        (StageTransfer::Fir, fir.input_units, fir.output_units)
    } else if let Some(coefficients) = stage.coefficients {
        (
            StageTransfer::Coefficients,
            coefficients.input_units,
            coefficients.output_units,
        )
    } else {
        (StageTransfer::GainOnly, None, None)
    };

    Ok(ResponseStage {
        number: stage.number,
        gain,
        input_units: input_units.map(|u| u.name),
        output_units: output_units.map(|u| u.name),
        transfer,
    })
}

fn convert_channel(channel: XmlChannel) -> Result<Channel> {
    let response = match channel.response {
        Some(response) => {
            let mut stages = response
                .stages
                .into_iter()
                .map(convert_stage)
                .collect::<Result<Vec<_>>>()?;
            stages.sort_by_key(|s| s.number);
            Some(ChannelResponse {
                sensitivity: response.sensitivity.map(|s| Sensitivity {
                    value: s.value.value,
                    frequency: s.frequency.value,
                    input_units: s.input_units.name,
                    output_units: s.output_units.name,
                }),
                stages,
            })
        }
        None => None,
    };

    Ok(Channel {
        location_code: channel.location_code.trim().to_string(),
        code: channel.code,
        start: channel.start_date.as_deref().and_then(parse_xml_date),
        end: channel.end_date.as_deref().and_then(parse_xml_date),
        sample_rate: channel.sample_rate.map(|r| r.value),
        response,
    })
}

/// Parse a StationXML document into an [`Inventory`]
pub fn parse_station_xml(xml: &str) -> Result<Inventory> {
    let document: FdsnStationXml = quick_xml::de::from_str(xml)?;

    let mut networks = Vec::with_capacity(document.networks.len());
    for network in document.networks {
        let mut stations = Vec::with_capacity(network.stations.len());
        for station in network.stations {
            let mut channels = Vec::with_capacity(station.channels.len());
            for channel in station.channels {
                let label = format!(
                    "{}.{}.{}.{}",
                    network.code, station.code, channel.location_code, channel.code
                );
                match convert_channel(channel) {
                    Ok(channel) => channels.push(channel),
                    Err(e) => warn!("Skipping channel {}: {}", label, e),
                }
            }
            stations.push(Station {
                code: station.code,
                latitude: station.latitude.value,
                longitude: station.longitude.value,
                elevation: station.elevation.value,
                site_name: station.site.and_then(|s| s.name),
                channels,
            });
        }
        networks.push(Network {
            code: network.code,
            description: network.description,
            stations,
        });
    }

    Ok(Inventory { networks })
}
