//! Self-describing binary container for attributes, n-dimensional datasets
//! and nested groups.
//!
//! A file starts with the magic bytes `ASKT` followed by a byte giving the
//! endianness of the remaining content (0 for little, 1 for big endian) and
//! a format version. The root table follows, with each table consisting of
//! its attributes, datasets and groups in name order.

use super::Endianness;
use crate::error::{Result, SimulationError};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use std::{
    collections::BTreeMap,
    fs,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

const MAGIC: &[u8; 4] = b"ASKT";
const FORMAT_VERSION: u32 = 1;

const KIND_FLOAT: u8 = 0;
const KIND_INT: u8 = 1;
const KIND_BOOL: u8 = 2;
const KIND_TEXT: u8 = 3;

/// Typed value of an attribute or dataset.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
    Bool(ArrayD<bool>),
    Text(Vec<String>),
}

impl Value {
    /// Creates a scalar floating-point value.
    pub fn float_scalar(value: f64) -> Self {
        Self::Float(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Creates a scalar integer value.
    pub fn int_scalar(value: i64) -> Self {
        Self::Int(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Creates a value holding a single string.
    pub fn text(value: &str) -> Self {
        Self::Text(vec![value.to_string()])
    }

    pub fn float_1d(values: Vec<f64>) -> Self {
        Self::Float(Array1::from(values).into_dyn())
    }

    pub fn int_1d(values: Vec<i64>) -> Self {
        Self::Int(Array1::from(values).into_dyn())
    }

    pub fn bool_1d(values: Vec<bool>) -> Self {
        Self::Bool(Array1::from(values).into_dyn())
    }

    pub fn as_float(&self) -> Option<&ArrayD<f64>> {
        match self {
            Self::Float(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&ArrayD<i64>> {
        match self {
            Self::Int(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&ArrayD<bool>> {
        match self {
            Self::Bool(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            Self::Text(strings) => Some(strings),
            _ => None,
        }
    }

    /// Returns the value as a floating-point number if it holds a single
    /// number of any numeric type.
    pub fn to_float_scalar(&self) -> Option<f64> {
        match self {
            Self::Float(array) if array.len() == 1 => array.iter().next().copied(),
            Self::Int(array) if array.len() == 1 => array.iter().next().map(|&v| v as f64),
            _ => None,
        }
    }

    /// Returns the value as an integer if it holds a single integer.
    pub fn to_int_scalar(&self) -> Option<i64> {
        match self {
            Self::Int(array) if array.len() == 1 => array.iter().next().copied(),
            _ => None,
        }
    }

    /// Number of entries along the first axis, or `None` for scalars.
    pub fn n_rows(&self) -> Option<usize> {
        match self {
            Self::Float(array) => array.shape().first().copied(),
            Self::Int(array) => array.shape().first().copied(),
            Self::Bool(array) => array.shape().first().copied(),
            Self::Text(strings) => Some(strings.len()),
        }
    }

    /// Creates a new value containing only the rows along the first axis
    /// for which the mask is true.
    ///
    /// The value is returned unchanged if its number of rows does not match
    /// the mask length.
    pub fn select_rows(&self, mask: &[bool]) -> Self {
        if self.n_rows() != Some(mask.len()) {
            return self.clone();
        }
        let indices: Vec<_> = mask
            .iter()
            .enumerate()
            .filter_map(|(idx, &keep)| if keep { Some(idx) } else { None })
            .collect();
        match self {
            Self::Float(array) => Self::Float(array.select(Axis(0), &indices)),
            Self::Int(array) => Self::Int(array.select(Axis(0), &indices)),
            Self::Bool(array) => Self::Bool(array.select(Axis(0), &indices)),
            Self::Text(strings) => Self::Text(indices.iter().map(|&idx| strings[idx].clone()).collect()),
        }
    }
}

/// Table of named attributes, datasets and nested groups.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataTable {
    attributes: BTreeMap<String, Value>,
    datasets: BTreeMap<String, Value>,
    groups: BTreeMap<String, DataTable>,
}

impl DataTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn datasets(&self) -> &BTreeMap<String, Value> {
        &self.datasets
    }

    pub fn groups(&self) -> &BTreeMap<String, DataTable> {
        &self.groups
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    /// Returns the attribute with the given name as a number, if it exists
    /// and is numeric.
    pub fn float_attribute(&self, name: &str) -> Option<f64> {
        self.attribute(name).and_then(Value::to_float_scalar)
    }

    /// Returns the first string of the attribute with the given name, if it
    /// exists and is textual.
    pub fn text_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .and_then(Value::as_text)
            .and_then(|strings| strings.first())
            .map(String::as_str)
    }

    pub fn dataset(&self, name: &str) -> Option<&Value> {
        self.datasets.get(name)
    }

    pub fn has_dataset(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    pub fn set_dataset(&mut self, name: &str, value: Value) {
        self.datasets.insert(name.to_string(), value);
    }

    /// Returns the floating-point dataset with the given name, or an error if
    /// it is missing or has another type.
    pub fn float_dataset(&self, name: &str) -> Result<&ArrayD<f64>> {
        self.dataset(name)
            .ok_or_else(|| missing_dataset_error(name))?
            .as_float()
            .ok_or_else(|| wrong_type_error(name, "float"))
    }

    /// Returns the integer dataset with the given name, or an error if it is
    /// missing or has another type.
    pub fn int_dataset(&self, name: &str) -> Result<&ArrayD<i64>> {
        self.dataset(name)
            .ok_or_else(|| missing_dataset_error(name))?
            .as_int()
            .ok_or_else(|| wrong_type_error(name, "integer"))
    }

    /// Returns the boolean dataset with the given name, or an error if it is
    /// missing or has another type.
    pub fn bool_dataset(&self, name: &str) -> Result<&ArrayD<bool>> {
        self.dataset(name)
            .ok_or_else(|| missing_dataset_error(name))?
            .as_bool()
            .ok_or_else(|| wrong_type_error(name, "boolean"))
    }

    /// Returns the text dataset with the given name, or an error if it is
    /// missing or has another type.
    pub fn text_dataset(&self, name: &str) -> Result<&[String]> {
        self.dataset(name)
            .ok_or_else(|| missing_dataset_error(name))?
            .as_text()
            .ok_or_else(|| wrong_type_error(name, "text"))
    }

    pub fn group(&self, name: &str) -> Option<&DataTable> {
        self.groups.get(name)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn set_group(&mut self, name: &str, group: DataTable) {
        self.groups.insert(name.to_string(), group);
    }

    /// Writes the table to the given file using the given byte order.
    pub fn write_to_file(&self, file_path: &Path, endianness: Endianness) -> Result<()> {
        let file = fs::File::create(file_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        match endianness {
            Endianness::Little => {
                writer.write_u8(0)?;
                writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
                write_table::<LittleEndian, _>(&mut writer, self)?;
            }
            Endianness::Big => {
                writer.write_u8(1)?;
                writer.write_u32::<BigEndian>(FORMAT_VERSION)?;
                write_table::<BigEndian, _>(&mut writer, self)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a table from the given file.
    pub fn read_from_file(file_path: &Path) -> Result<Self> {
        let file = fs::File::open(file_path)?;
        let mut reader = BufReader::new(file);
        let mut magic = [0_u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SimulationError::InvalidData(format!(
                "{} is not a data table file",
                file_path.to_string_lossy()
            )));
        }
        let table = match reader.read_u8()? {
            0 => {
                check_version(reader.read_u32::<LittleEndian>()?)?;
                read_table::<LittleEndian, _>(&mut reader)?
            }
            1 => {
                check_version(reader.read_u32::<BigEndian>()?)?;
                read_table::<BigEndian, _>(&mut reader)?
            }
            flag => {
                return Err(SimulationError::InvalidData(format!(
                    "Invalid endianness flag {} in data table file",
                    flag
                )))
            }
        };
        Ok(table)
    }
}

fn missing_dataset_error(name: &str) -> SimulationError {
    SimulationError::InvalidData(format!("Missing dataset {}", name))
}

fn wrong_type_error(name: &str, expected: &str) -> SimulationError {
    SimulationError::InvalidData(format!("Dataset {} is not of {} type", name, expected))
}

fn check_version(version: u32) -> Result<()> {
    if version == FORMAT_VERSION {
        Ok(())
    } else {
        Err(SimulationError::InvalidData(format!(
            "Unsupported data table format version {}",
            version
        )))
    }
}

fn write_string<B: ByteOrder, W: Write>(writer: &mut W, string: &str) -> io::Result<()> {
    writer.write_u64::<B>(string.len() as u64)?;
    writer.write_all(string.as_bytes())
}

fn write_shape<B: ByteOrder, W: Write>(writer: &mut W, shape: &[usize]) -> io::Result<()> {
    writer.write_u32::<B>(shape.len() as u32)?;
    for &dim in shape {
        writer.write_u64::<B>(dim as u64)?;
    }
    Ok(())
}

fn write_value<B: ByteOrder, W: Write>(writer: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Float(array) => {
            writer.write_u8(KIND_FLOAT)?;
            write_shape::<B, _>(writer, array.shape())?;
            for &element in array.iter() {
                writer.write_f64::<B>(element)?;
            }
        }
        Value::Int(array) => {
            writer.write_u8(KIND_INT)?;
            write_shape::<B, _>(writer, array.shape())?;
            for &element in array.iter() {
                writer.write_i64::<B>(element)?;
            }
        }
        Value::Bool(array) => {
            writer.write_u8(KIND_BOOL)?;
            write_shape::<B, _>(writer, array.shape())?;
            for &element in array.iter() {
                writer.write_u8(u8::from(element))?;
            }
        }
        Value::Text(strings) => {
            writer.write_u8(KIND_TEXT)?;
            writer.write_u64::<B>(strings.len() as u64)?;
            for string in strings {
                write_string::<B, _>(writer, string)?;
            }
        }
    }
    Ok(())
}

fn write_entries<B: ByteOrder, W: Write>(
    writer: &mut W,
    entries: &BTreeMap<String, Value>,
) -> io::Result<()> {
    writer.write_u32::<B>(entries.len() as u32)?;
    for (name, value) in entries {
        write_string::<B, _>(writer, name)?;
        write_value::<B, _>(writer, value)?;
    }
    Ok(())
}

fn write_table<B: ByteOrder, W: Write>(writer: &mut W, table: &DataTable) -> io::Result<()> {
    write_entries::<B, _>(writer, &table.attributes)?;
    write_entries::<B, _>(writer, &table.datasets)?;
    writer.write_u32::<B>(table.groups.len() as u32)?;
    for (name, group) in &table.groups {
        write_string::<B, _>(writer, name)?;
        write_table::<B, _>(writer, group)?;
    }
    Ok(())
}

/// Reads exactly `length` bytes, failing if the data ends before that.
///
/// The buffer grows with the data actually read, so a corrupt length field
/// cannot trigger an oversized allocation.
fn read_bytes<R: Read>(reader: &mut R, length: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.by_ref().take(length).read_to_end(&mut bytes)?;
    if bytes.len() as u64 == length {
        Ok(bytes)
    } else {
        Err(SimulationError::InvalidData(format!(
            "Data table ended after {} of {} expected bytes",
            bytes.len(),
            length
        )))
    }
}

fn read_string<B: ByteOrder, R: Read>(reader: &mut R) -> Result<String> {
    let length = reader.read_u64::<B>()?;
    let bytes = read_bytes(reader, length)?;
    String::from_utf8(bytes)
        .map_err(|err| SimulationError::InvalidData(format!("Invalid string in data table: {}", err)))
}

fn read_shape<B: ByteOrder, R: Read>(reader: &mut R) -> Result<Vec<usize>> {
    let ndim = reader.read_u32::<B>()?;
    let mut shape = Vec::new();
    for _ in 0..ndim {
        let length = reader.read_u64::<B>()?;
        shape.push(usize::try_from(length).map_err(|_| {
            SimulationError::InvalidData(format!("Invalid array dimension {} in data table", length))
        })?);
    }
    Ok(shape)
}

/// Number of bytes occupied by an array of the given shape.
fn array_byte_count(shape: &[usize], element_size: usize) -> Result<u64> {
    shape
        .iter()
        .try_fold(element_size, |count, &length| count.checked_mul(length))
        .map(|count| count as u64)
        .ok_or_else(|| {
            SimulationError::InvalidData(format!("Array shape {:?} in data table is too large", shape))
        })
}

fn array_from_shape<T>(shape: Vec<usize>, elements: Vec<T>) -> Result<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(&shape), elements)
        .map_err(|err| SimulationError::InvalidData(format!("Invalid array shape: {}", err)))
}

fn read_value<B: ByteOrder, R: Read>(reader: &mut R) -> Result<Value> {
    match reader.read_u8()? {
        KIND_FLOAT => {
            let shape = read_shape::<B, _>(reader)?;
            let bytes = read_bytes(reader, array_byte_count(&shape, 8)?)?;
            let mut elements = vec![0.0; bytes.len() / 8];
            B::read_f64_into(&bytes, &mut elements);
            Ok(Value::Float(array_from_shape(shape, elements)?))
        }
        KIND_INT => {
            let shape = read_shape::<B, _>(reader)?;
            let bytes = read_bytes(reader, array_byte_count(&shape, 8)?)?;
            let mut elements = vec![0; bytes.len() / 8];
            B::read_i64_into(&bytes, &mut elements);
            Ok(Value::Int(array_from_shape(shape, elements)?))
        }
        KIND_BOOL => {
            let shape = read_shape::<B, _>(reader)?;
            let bytes = read_bytes(reader, array_byte_count(&shape, 1)?)?;
            let elements = bytes.into_iter().map(|byte| byte != 0).collect();
            Ok(Value::Bool(array_from_shape(shape, elements)?))
        }
        KIND_TEXT => {
            let count = reader.read_u64::<B>()?;
            let mut strings = Vec::new();
            for _ in 0..count {
                strings.push(read_string::<B, _>(reader)?);
            }
            Ok(Value::Text(strings))
        }
        kind => Err(SimulationError::InvalidData(format!(
            "Invalid value kind {} in data table",
            kind
        ))),
    }
}

fn read_entries<B: ByteOrder, R: Read>(reader: &mut R) -> Result<BTreeMap<String, Value>> {
    let n_entries = reader.read_u32::<B>()?;
    (0..n_entries)
        .map(|_| {
            let name = read_string::<B, _>(reader)?;
            let value = read_value::<B, _>(reader)?;
            Ok((name, value))
        })
        .collect()
}

fn read_table<B: ByteOrder, R: Read>(reader: &mut R) -> Result<DataTable> {
    let attributes = read_entries::<B, _>(reader)?;
    let datasets = read_entries::<B, _>(reader)?;
    let n_groups = reader.read_u32::<B>()?;
    let groups = (0..n_groups)
        .map(|_| {
            let name = read_string::<B, _>(reader)?;
            let group = read_table::<B, _>(reader)?;
            Ok((name, group))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    Ok(DataTable {
        attributes,
        datasets,
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn example_table() -> DataTable {
        let mut station = DataTable::new();
        station.set_dataset(
            "travel_times",
            Value::Float(arr2(&[[1.0, f64::NAN], [3.5, 4.0]]).into_dyn()),
        );
        station.set_attribute("antenna_positions", Value::float_1d(vec![0.0, 1.0, -2.0]));

        let mut table = DataTable::new();
        table.set_attribute("Vrms", Value::float_scalar(1e-5));
        table.set_attribute("n_events", Value::int_scalar(10));
        table.set_attribute("trigger_names", Value::Text(vec!["a".into(), "b".into()]));
        table.set_dataset("weights", Value::float_1d(vec![1.0, 0.5]));
        table.set_dataset("triggered", Value::bool_1d(vec![true, false]));
        table.set_dataset("event_group_ids", Value::int_1d(vec![3, -1]));
        table.set_group("station_101", station);
        table
    }

    #[test]
    fn table_survives_file_round_trip_in_both_byte_orders() {
        let directory = tempfile::tempdir().unwrap();
        for endianness in [Endianness::Little, Endianness::Big] {
            let path = directory.path().join("table.askt");
            let table = example_table();
            table.write_to_file(&path, endianness).unwrap();
            let read = DataTable::read_from_file(&path).unwrap();

            assert_eq!(read.dataset("weights"), table.dataset("weights"));
            assert_eq!(read.dataset("triggered"), table.dataset("triggered"));
            assert_eq!(read.float_attribute("n_events"), Some(10.0));
            assert_eq!(read.attribute("trigger_names"), table.attribute("trigger_names"));
            let travel_times = read
                .group("station_101")
                .unwrap()
                .float_dataset("travel_times")
                .unwrap();
            assert_eq!(travel_times.shape(), &[2, 2]);
            assert!(travel_times[[0, 1]].is_nan());
            assert_eq!(travel_times[[1, 0]], 3.5);
        }
    }

    #[test]
    fn rows_are_selected_by_mask() {
        let value = Value::Float(arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn());
        let selected = value.select_rows(&[true, false, true]);
        assert_eq!(
            selected,
            Value::Float(arr2(&[[1.0, 2.0], [5.0, 6.0]]).into_dyn())
        );
        let text = Value::Text(vec!["x".into(), "y".into()]);
        assert_eq!(text.select_rows(&[false, true]), Value::Text(vec!["y".into()]));
        let scalar = Value::float_scalar(2.0);
        assert_eq!(scalar.select_rows(&[true, false]), scalar);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("not_a_table");
        fs::write(&path, b"HDF5....").unwrap();
        assert!(matches!(
            DataTable::read_from_file(&path),
            Err(SimulationError::InvalidData(_))
        ));
    }

    fn little_endian_header() -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.write_u8(0).unwrap();
        bytes.write_u32::<LittleEndian>(FORMAT_VERSION).unwrap();
        bytes
    }

    fn read_bytes_as_table(bytes: &[u8]) -> Result<DataTable> {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("corrupt");
        fs::write(&path, bytes).unwrap();
        DataTable::read_from_file(&path)
    }

    #[test]
    fn oversized_name_length_is_rejected() {
        let mut bytes = little_endian_header();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u64::<LittleEndian>(u64::MAX).unwrap();
        bytes.extend_from_slice(b"abc");
        assert!(matches!(
            read_bytes_as_table(&bytes),
            Err(SimulationError::InvalidData(_))
        ));
    }

    #[test]
    fn overflowing_array_shape_is_rejected() {
        let mut bytes = little_endian_header();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u64::<LittleEndian>(1).unwrap();
        bytes.push(b'x');
        bytes.write_u8(KIND_FLOAT).unwrap();
        bytes.write_u32::<LittleEndian>(2).unwrap();
        bytes.write_u64::<LittleEndian>(u64::MAX / 2).unwrap();
        bytes.write_u64::<LittleEndian>(u64::MAX / 2).unwrap();
        assert!(matches!(
            read_bytes_as_table(&bytes),
            Err(SimulationError::InvalidData(_))
        ));
    }

    #[test]
    fn truncated_dataset_is_rejected() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("table");
        example_table().write_to_file(&path, Endianness::Little).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(read_bytes_as_table(&bytes[..bytes.len() - 3]).is_err());
    }
}
