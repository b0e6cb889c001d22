//! # Generation Snapshots
//!
//! Serializes the parameter history of an inner loop for offline
//! inspection. Uses `serde` for serialization and `bincode` as the binary
//! format. Snapshots carry values only; the autograd graph is not saved and
//! snapshots are never loaded back into a store.

use crate::maml::{Generation, ParameterOrigin};
use crate::tensor::{Tensor, TensorData};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error (Bincode): {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Tensor data does not match its shape: '{name}', shape {shape:?}, {len} values")]
    ShapeMismatch {
        name: String,
        shape: Vec<usize>,
        len: usize,
    },
}

/// Shape plus flat row-major data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SerializableTensor {
    pub shape: Vec<usize>,
    pub data: Vec<TensorData>,
}

impl SerializableTensor {
    pub fn from_tensor(tensor: &Tensor) -> Self {
        SerializableTensor {
            shape: tensor.shape().to_vec(),
            data: tensor.to_vec(),
        }
    }

    /// Rebuilds a constant tensor (no gradient history).
    pub fn to_tensor(&self) -> Result<Tensor, crate::tensor::TensorError> {
        Tensor::from_vec(&self.shape, self.data.clone(), false)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParameterSnapshot {
    pub name: String,
    pub origin: ParameterOrigin,
    pub value: SerializableTensor,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationSnapshot {
    pub step: usize,
    pub parameters: Vec<ParameterSnapshot>,
}

impl GenerationSnapshot {
    pub fn capture(generation: &Generation) -> Self {
        GenerationSnapshot {
            step: generation.step(),
            parameters: generation
                .iter()
                .map(|(name, parameter)| ParameterSnapshot {
                    name: name.to_string(),
                    origin: parameter.origin(),
                    value: SerializableTensor::from_tensor(parameter.value()),
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSnapshot> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        let snapshot: GenerationSnapshot = bincode::deserialize(bytes)?;
        snapshot.check()?;
        Ok(snapshot)
    }

    fn check(&self) -> Result<(), SerializationError> {
        for parameter in &self.parameters {
            let expected: usize = parameter.value.shape.iter().product();
            if expected != parameter.value.data.len() {
                return Err(SerializationError::ShapeMismatch {
                    name: parameter.name.clone(),
                    shape: parameter.value.shape.clone(),
                    len: parameter.value.data.len(),
                });
            }
        }
        Ok(())
    }
}

/// Writes the snapshots of `generations` to `path`.
pub fn save_snapshots<P: AsRef<Path>>(
    generations: &[Generation],
    path: P,
) -> Result<(), SerializationError> {
    let snapshots: Vec<GenerationSnapshot> =
        generations.iter().map(GenerationSnapshot::capture).collect();
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    bincode::serialize_into(&mut writer, &snapshots)?;
    writer.flush()?;
    Ok(())
}

pub fn load_snapshots<P: AsRef<Path>>(path: P) -> Result<Vec<GenerationSnapshot>, SerializationError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let snapshots: Vec<GenerationSnapshot> = bincode::deserialize_from(reader)?;
    for snapshot in &snapshots {
        snapshot.check()?;
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_bytes_are_rejected() {
        let snapshot = GenerationSnapshot {
            step: 2,
            parameters: vec![ParameterSnapshot {
                name: "w".to_string(),
                origin: ParameterOrigin::Adapted { step: 2 },
                value: SerializableTensor {
                    shape: vec![2],
                    data: vec![0.5, 1.5],
                },
            }],
        };
        let bytes = snapshot.to_bytes().unwrap();
        assert!(GenerationSnapshot::from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn failed_writes_are_reported() {
        let generation = Generation::initial();
        let result = save_snapshots(&[generation], "/dev/full");
        assert!(matches!(result, Err(SerializationError::Io(_))));
    }

    #[test]
    fn inconsistent_shapes_are_rejected() {
        let snapshot = GenerationSnapshot {
            step: 0,
            parameters: vec![ParameterSnapshot {
                name: "w".to_string(),
                origin: ParameterOrigin::Materialized,
                value: SerializableTensor {
                    shape: vec![3],
                    data: vec![1.0],
                },
            }],
        };
        let bytes = snapshot.to_bytes().unwrap();
        assert!(matches!(
            GenerationSnapshot::from_bytes(&bytes),
            Err(SerializationError::ShapeMismatch { .. })
        ));
    }
}
