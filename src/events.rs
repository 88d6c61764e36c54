//! Neutrino interactions and the showers they induce, as read from an input
//! dataset.

use crate::{
    error::{Result, SimulationError},
    geometry::{Dim3::Z, Point3, Vec3},
    io::table::DataTable,
    particles::ShowerClass,
    simulation::fsi,
};
use std::{collections::BTreeMap, str::FromStr};

/// Names of the input datasets that must be present.
pub const REQUIRED_DATASETS: [&str; 13] = [
    "event_group_ids",
    "flavors",
    "energies",
    "interaction_type",
    "xx",
    "yy",
    "zz",
    "zeniths",
    "azimuths",
    "inelasticity",
    "n_interaction",
    "shower_type",
    "shower_energies",
];

/// One particle shower capable of emitting a radio pulse.
#[derive(Clone, Debug, PartialEq)]
pub struct Shower {
    /// Row of the shower in the input dataset.
    pub idx: usize,
    pub shower_id: i64,
    pub event_group_id: i64,
    /// Position of the interaction vertex [m].
    pub vertex: Point3<fsi>,
    /// Time of the interaction relative to the first interaction in the
    /// event group [ns], if known.
    pub vertex_time: Option<fsi>,
    /// Zenith angle of the arrival direction of the neutrino [rad].
    pub zenith: fsi,
    /// Azimuth angle of the arrival direction of the neutrino [rad].
    pub azimuth: fsi,
    /// Energy of the neutrino [eV].
    pub energy: fsi,
    /// Energy deposited in the shower [eV].
    pub shower_energy: fsi,
    pub flavor: i64,
    pub interaction_type: String,
    pub shower_class: ShowerClass,
    pub inelasticity: fsi,
    /// Index of the interaction within the history of the neutrino, with 1
    /// for the first interaction.
    pub n_interaction: i64,
    realization_id: Option<u64>,
}

impl Shower {
    /// Unit vector along the direction of propagation of the shower.
    pub fn axis(&self) -> Vec3<fsi> {
        -Vec3::from_spherical_angles(self.zenith, self.azimuth)
    }

    /// Identifier of the stochastic realization used for this shower, if
    /// one has been chosen yet.
    pub fn realization_id(&self) -> Option<u64> {
        self.realization_id
    }

    /// Returns the realization id of the shower, adopting the given one if
    /// none has been chosen yet.
    ///
    /// Once set, the id never changes.
    pub fn get_or_attach_realization_id(&mut self, realization_id: u64) -> u64 {
        *self.realization_id.get_or_insert(realization_id)
    }
}

/// Showers originating from the same neutrino.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventGroup {
    pub event_group_id: i64,
    /// Indices of the showers in the group, in input order.
    pub shower_indices: Vec<usize>,
}

impl EventGroup {
    /// Index of the shower of the first interaction of the neutrino.
    pub fn mother_index(&self) -> usize {
        self.shower_indices[0]
    }
}

/// Cylindrical volume in which vertices count towards the event rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiducialVolume {
    pub rmin: fsi,
    pub rmax: fsi,
    pub zmin: fsi,
    pub zmax: fsi,
}

impl FiducialVolume {
    /// Reads the fiducial volume from the attributes of the input, if all
    /// bounds are present.
    pub fn from_attributes(table: &DataTable) -> Option<Self> {
        Some(Self {
            rmin: table.float_attribute("fiducial_rmin")?,
            rmax: table.float_attribute("fiducial_rmax")?,
            zmin: table.float_attribute("fiducial_zmin")?,
            zmax: table.float_attribute("fiducial_zmax")?,
        })
    }

    /// Whether the given position lies in the volume, boundaries included.
    pub fn contains(&self, position: &Point3<fsi>) -> bool {
        let r = position.radial_distance();
        let z = position[Z];
        self.rmin <= r && r <= self.rmax && self.zmin <= z && z <= self.zmax
    }
}

/// Volume in which the interactions were simulated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimulationVolume {
    Box {
        xmin: fsi,
        xmax: fsi,
        ymin: fsi,
        ymax: fsi,
        zmin: fsi,
        zmax: fsi,
    },
    Cylinder {
        rmin: fsi,
        rmax: fsi,
        zmin: fsi,
        zmax: fsi,
    },
}

impl SimulationVolume {
    /// Reads the simulation volume from the attributes of the input.
    ///
    /// Box bounds take precedence over cylinder bounds.
    pub fn from_attributes(table: &DataTable) -> Option<Self> {
        let attr = |name: &str| table.float_attribute(name);
        if table.has_attribute("xmax") {
            Some(Self::Box {
                xmin: attr("xmin")?,
                xmax: attr("xmax")?,
                ymin: attr("ymin")?,
                ymax: attr("ymax")?,
                zmin: attr("zmin")?,
                zmax: attr("zmax")?,
            })
        } else if table.has_attribute("rmin") {
            Some(Self::Cylinder {
                rmin: attr("rmin")?,
                rmax: attr("rmax")?,
                zmin: attr("zmin")?,
                zmax: attr("zmax")?,
            })
        } else {
            None
        }
    }

    pub fn volume(&self) -> fsi {
        match *self {
            Self::Box {
                xmin,
                xmax,
                ymin,
                ymax,
                zmin,
                zmax,
            } => (xmax - xmin) * (ymax - ymin) * (zmax - zmin),
            Self::Cylinder {
                rmin,
                rmax,
                zmin,
                zmax,
            } => std::f64::consts::PI * (rmax * rmax - rmin * rmin) * (zmax - zmin),
        }
    }
}

/// Showers and event groups of an input dataset, together with the dataset
/// itself.
#[derive(Clone, Debug)]
pub struct InputDataset {
    table: DataTable,
    showers: Vec<Shower>,
    event_groups: Vec<EventGroup>,
}

fn column<'a>(table: &'a DataTable, name: &str, n_showers: usize) -> Result<&'a [fsi]> {
    let values = table.float_dataset(name)?;
    check_length(name, values.len(), n_showers)?;
    values.as_slice().ok_or_else(|| {
        SimulationError::InvalidData(format!("Dataset {} is not contiguous", name))
    })
}

fn int_column<'a>(table: &'a DataTable, name: &str, n_showers: usize) -> Result<&'a [i64]> {
    let values = table.int_dataset(name)?;
    check_length(name, values.len(), n_showers)?;
    values.as_slice().ok_or_else(|| {
        SimulationError::InvalidData(format!("Dataset {} is not contiguous", name))
    })
}

fn check_length(name: &str, length: usize, n_showers: usize) -> Result<()> {
    if length == n_showers {
        Ok(())
    } else {
        Err(SimulationError::InvalidData(format!(
            "Dataset {} has {} entries, expected {}",
            name, length, n_showers
        )))
    }
}

impl InputDataset {
    /// Extracts showers and event groups from the given table.
    pub fn from_table(table: DataTable) -> Result<Self> {
        for name in REQUIRED_DATASETS {
            if !table.has_dataset(name) {
                return Err(SimulationError::InvalidData(format!(
                    "Missing dataset {} in input",
                    name
                )));
            }
        }
        let n_showers = table.int_dataset("event_group_ids")?.len();

        let event_group_ids = int_column(&table, "event_group_ids", n_showers)?;
        let shower_ids: Vec<i64> = if table.has_dataset("shower_ids") {
            int_column(&table, "shower_ids", n_showers)?.to_vec()
        } else {
            (0..n_showers as i64).collect()
        };
        let flavors = int_column(&table, "flavors", n_showers)?;
        let energies = column(&table, "energies", n_showers)?;
        let xx = column(&table, "xx", n_showers)?;
        let yy = column(&table, "yy", n_showers)?;
        let zz = column(&table, "zz", n_showers)?;
        let zeniths = column(&table, "zeniths", n_showers)?;
        let azimuths = column(&table, "azimuths", n_showers)?;
        let inelasticity = column(&table, "inelasticity", n_showers)?;
        let n_interaction = int_column(&table, "n_interaction", n_showers)?;
        let shower_energies = column(&table, "shower_energies", n_showers)?;
        let interaction_types = table.text_dataset("interaction_type")?;
        check_length("interaction_type", interaction_types.len(), n_showers)?;
        let shower_types = table.text_dataset("shower_type")?;
        check_length("shower_type", shower_types.len(), n_showers)?;
        let vertex_times = if table.has_dataset("vertex_times") {
            Some(column(&table, "vertex_times", n_showers)?)
        } else {
            None
        };
        let realizations = if table.has_dataset("shower_realization") {
            Some(int_column(&table, "shower_realization", n_showers)?)
        } else {
            None
        };

        let mut showers = Vec::with_capacity(n_showers);
        for idx in 0..n_showers {
            let shower_class = ShowerClass::from_str(&shower_types[idx]).map_err(|_| {
                SimulationError::InvalidData(format!(
                    "Invalid shower type {} for shower {}",
                    shower_types[idx], shower_ids[idx]
                ))
            })?;
            showers.push(Shower {
                idx,
                shower_id: shower_ids[idx],
                event_group_id: event_group_ids[idx],
                vertex: Point3::new(xx[idx], yy[idx], zz[idx]),
                vertex_time: vertex_times.map(|times| times[idx]).filter(|t| t.is_finite()),
                zenith: zeniths[idx],
                azimuth: azimuths[idx],
                energy: energies[idx],
                shower_energy: shower_energies[idx],
                flavor: flavors[idx],
                interaction_type: interaction_types[idx].clone(),
                shower_class,
                inelasticity: inelasticity[idx],
                n_interaction: n_interaction[idx],
                realization_id: realizations
                    .and_then(|ids| u64::try_from(ids[idx]).ok()),
            });
        }

        let mut group_positions = BTreeMap::new();
        let mut event_groups: Vec<EventGroup> = Vec::new();
        for (idx, &event_group_id) in event_group_ids.iter().enumerate() {
            let position = *group_positions
                .entry(event_group_id)
                .or_insert_with(|| {
                    event_groups.push(EventGroup {
                        event_group_id,
                        shower_indices: Vec::new(),
                    });
                    event_groups.len() - 1
                });
            event_groups[position].shower_indices.push(idx);
        }

        Ok(Self {
            table,
            showers,
            event_groups,
        })
    }

    /// Reads the input dataset from the given file.
    pub fn from_file(file_path: &std::path::Path) -> Result<Self> {
        Self::from_table(DataTable::read_from_file(file_path)?)
    }

    pub fn table(&self) -> &DataTable {
        &self.table
    }

    pub fn showers(&self) -> &[Shower] {
        &self.showers
    }

    pub fn showers_mut(&mut self) -> &mut [Shower] {
        &mut self.showers
    }

    pub fn n_showers(&self) -> usize {
        self.showers.len()
    }

    /// Event groups in order of first appearance in the input.
    pub fn event_groups(&self) -> &[EventGroup] {
        &self.event_groups
    }

    /// Total number of simulated neutrinos, including those without any
    /// shower in the input.
    pub fn n_events(&self) -> fsi {
        self.table
            .float_attribute("n_events")
            .unwrap_or(self.event_groups.len() as fsi)
    }

    pub fn fiducial_volume(&self) -> Option<FiducialVolume> {
        FiducialVolume::from_attributes(&self.table)
    }

    pub fn simulation_volume(&self) -> Option<SimulationVolume> {
        SimulationVolume::from_attributes(&self.table)
    }

    /// Realization ids of all showers, with -1 for showers without one.
    pub fn realization_ids(&self) -> Vec<i64> {
        self.showers
            .iter()
            .map(|shower| {
                shower
                    .realization_id()
                    .and_then(|id| i64::try_from(id).ok())
                    .unwrap_or(-1)
            })
            .collect()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::io::table::Value;

    /// Creates an input table with the given vertices, all hadronic showers
    /// of 1 EeV arriving from the given zenith angle.
    pub fn create_input_table(
        event_group_ids: Vec<i64>,
        vertices: &[[fsi; 3]],
        zenith: fsi,
    ) -> DataTable {
        let n = event_group_ids.len();
        let mut table = DataTable::new();
        table.set_dataset("event_group_ids", Value::int_1d(event_group_ids));
        table.set_dataset("flavors", Value::int_1d(vec![14; n]));
        table.set_dataset("energies", Value::float_1d(vec![1e18; n]));
        table.set_dataset("interaction_type", Value::Text(vec!["nc".to_string(); n]));
        table.set_dataset(
            "xx",
            Value::float_1d(vertices.iter().map(|v| v[0]).collect()),
        );
        table.set_dataset(
            "yy",
            Value::float_1d(vertices.iter().map(|v| v[1]).collect()),
        );
        table.set_dataset(
            "zz",
            Value::float_1d(vertices.iter().map(|v| v[2]).collect()),
        );
        table.set_dataset("zeniths", Value::float_1d(vec![zenith; n]));
        table.set_dataset("azimuths", Value::float_1d(vec![0.0; n]));
        table.set_dataset("inelasticity", Value::float_1d(vec![0.5; n]));
        table.set_dataset(
            "n_interaction",
            Value::int_1d((0..n).map(|_| 1).collect()),
        );
        table.set_dataset("shower_type", Value::Text(vec!["had".to_string(); n]));
        table.set_dataset("shower_energies", Value::float_1d(vec![1e18; n]));
        table
    }

    #[test]
    fn showers_are_grouped_by_event_group_in_input_order() {
        let table = create_input_table(
            vec![3, 3, 1],
            &[[0.0, 0.0, -100.0], [0.0, 0.0, -110.0], [5.0, 0.0, -200.0]],
            1.0,
        );
        let input = InputDataset::from_table(table).unwrap();
        assert_eq!(input.n_showers(), 3);
        assert_eq!(
            input.event_groups(),
            &[
                EventGroup {
                    event_group_id: 3,
                    shower_indices: vec![0, 1]
                },
                EventGroup {
                    event_group_id: 1,
                    shower_indices: vec![2]
                }
            ]
        );
        assert_eq!(input.showers()[2].shower_id, 2);
        assert_eq!(input.n_events(), 2.0);
        assert_eq!(input.realization_ids(), vec![-1, -1, -1]);
    }

    #[test]
    fn realization_id_is_attached_once() {
        let table = create_input_table(vec![0], &[[0.0, 0.0, -100.0]], 1.0);
        let mut input = InputDataset::from_table(table).unwrap();
        let shower = &mut input.showers_mut()[0];
        assert_eq!(shower.realization_id(), None);
        assert_eq!(shower.get_or_attach_realization_id(7), 7);
        assert_eq!(shower.get_or_attach_realization_id(9), 7);
        assert_eq!(shower.realization_id(), Some(7));
    }

    #[test]
    fn fiducial_boundary_is_inclusive() {
        let volume = FiducialVolume {
            rmin: 0.0,
            rmax: 1000.0,
            zmin: -2000.0,
            zmax: 0.0,
        };
        assert!(volume.contains(&Point3::new(1000.0, 0.0, -100.0)));
        assert!(!volume.contains(&Point3::new(1000.0 + 1e-9, 0.0, -100.0)));
        assert!(volume.contains(&Point3::new(0.0, 0.0, -2000.0)));
    }

    #[test]
    fn missing_fiducial_attributes_give_no_volume() {
        let mut table = create_input_table(vec![0], &[[0.0, 0.0, -100.0]], 1.0);
        table.set_attribute("fiducial_rmin", Value::float_scalar(0.0));
        assert!(FiducialVolume::from_attributes(&table).is_none());
    }

    #[test]
    fn simulation_volume_prefers_box() {
        let mut table = DataTable::new();
        for (name, value) in [("rmin", 0.0), ("rmax", 1.0), ("zmin", -1.0), ("zmax", 0.0)] {
            table.set_attribute(name, Value::float_scalar(value));
        }
        let cylinder = SimulationVolume::from_attributes(&table).unwrap();
        assert!((cylinder.volume() - std::f64::consts::PI).abs() < 1e-12);
        for (name, value) in [("xmin", 0.0), ("xmax", 2.0), ("ymin", 0.0), ("ymax", 3.0)] {
            table.set_attribute(name, Value::float_scalar(value));
        }
        assert_eq!(SimulationVolume::from_attributes(&table).unwrap().volume(), 6.0);
    }
}
