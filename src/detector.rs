//! Description of the antenna stations making up the detector.

use crate::{
    error::{Result, SimulationError},
    geometry::{Point3, Vec3},
    simulation::fsi,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Defines the properties of a detector that the simulation needs to know.
pub trait Detector {
    /// Returns the ids of all stations.
    fn station_ids(&self) -> Vec<i64>;

    /// Returns the number of channels in the given station.
    fn number_of_channels(&self, station_id: i64) -> Result<usize>;

    /// Returns the ids of the channels in the given station.
    fn channel_ids(&self, station_id: i64) -> Result<Vec<i64>>;

    /// Returns the frequency with which the given station samples its
    /// traces [GHz].
    fn sampling_frequency(&self, station_id: i64) -> Result<fsi>;

    /// Returns the number of samples in the traces of the given station.
    fn number_of_samples(&self, station_id: i64) -> Result<usize>;

    /// Returns the position of the given station.
    fn absolute_position(&self, station_id: i64) -> Result<Point3<fsi>>;

    /// Returns the position of the channel with the given index relative to
    /// its station.
    fn relative_position(&self, station_id: i64, channel_idx: usize) -> Result<Vec3<fsi>>;

    /// Returns the raw text the detector was described by.
    fn description_text(&self) -> &str;

    /// Returns the absolute position of the channel with the given index.
    fn channel_position(&self, station_id: i64, channel_idx: usize) -> Result<Point3<fsi>> {
        Ok(&self.absolute_position(station_id)? + &self.relative_position(station_id, channel_idx)?)
    }
}

/// Description of a single antenna channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescription {
    pub channel_id: i64,
    /// Position relative to the station [m].
    pub position: Vec3<fsi>,
}

/// Description of a single station.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationDescription {
    pub station_id: i64,
    /// Position of the station [m].
    pub position: Point3<fsi>,
    /// Sampling frequency of the digitizer [GHz].
    pub sampling_frequency: fsi,
    /// Number of samples recorded per trace.
    pub number_of_samples: usize,
    pub channels: Vec<ChannelDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DetectorDescription {
    stations: Vec<StationDescription>,
}

/// Detector described by a JSON document.
#[derive(Clone, Debug)]
pub struct JsonDetector {
    stations: Vec<StationDescription>,
    text: String,
}

impl JsonDetector {
    /// Reads the detector description from the given JSON file.
    pub fn from_file(file_path: &Path) -> Result<Self> {
        let text = fs::read_to_string(file_path)?;
        Self::from_json(text)
    }

    /// Parses the detector description from the given JSON text.
    pub fn from_json(text: String) -> Result<Self> {
        let description: DetectorDescription = serde_json::from_str(&text)?;
        for station in &description.stations {
            if station.sampling_frequency <= 0.0 {
                return Err(SimulationError::InvalidData(format!(
                    "Station {} has non-positive sampling frequency",
                    station.station_id
                )));
            }
            if station.number_of_samples == 0 {
                return Err(SimulationError::InvalidData(format!(
                    "Station {} records no samples",
                    station.station_id
                )));
            }
        }
        Ok(Self {
            stations: description.stations,
            text,
        })
    }

    fn station(&self, station_id: i64) -> Result<&StationDescription> {
        self.stations
            .iter()
            .find(|station| station.station_id == station_id)
            .ok_or_else(|| {
                SimulationError::InvalidData(format!("No station with id {} in detector", station_id))
            })
    }
}

impl Detector for JsonDetector {
    fn station_ids(&self) -> Vec<i64> {
        self.stations
            .iter()
            .map(|station| station.station_id)
            .collect()
    }

    fn number_of_channels(&self, station_id: i64) -> Result<usize> {
        Ok(self.station(station_id)?.channels.len())
    }

    fn channel_ids(&self, station_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .station(station_id)?
            .channels
            .iter()
            .map(|channel| channel.channel_id)
            .collect())
    }

    fn sampling_frequency(&self, station_id: i64) -> Result<fsi> {
        Ok(self.station(station_id)?.sampling_frequency)
    }

    fn number_of_samples(&self, station_id: i64) -> Result<usize> {
        Ok(self.station(station_id)?.number_of_samples)
    }

    fn absolute_position(&self, station_id: i64) -> Result<Point3<fsi>> {
        Ok(self.station(station_id)?.position)
    }

    fn relative_position(&self, station_id: i64, channel_idx: usize) -> Result<Vec3<fsi>> {
        self.station(station_id)?
            .channels
            .get(channel_idx)
            .map(|channel| channel.position)
            .ok_or_else(|| {
                SimulationError::InvalidData(format!(
                    "Station {} has no channel with index {}",
                    station_id, channel_idx
                ))
            })
    }

    fn description_text(&self) -> &str {
        &self.text
    }
}
