//! Model serialization and persistence
//!
//! Models are stored as pretty-printed JSON: the flat [`ModelParts`] plus
//! some metadata. Loading goes back through [`SvmModel::from_parts`], so a
//! corrupted file surfaces as `InvalidModel` rather than a broken model.

use crate::core::{Result, SVMError};
use crate::model::{ModelParts, SvmModel};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Serializable representation of a trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableModel {
    pub model: ModelParts,
    pub metadata: ModelMetadata,
}

/// Model metadata for tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Creation timestamp (RFC 3339, UTC)
    pub created_at: String,
    pub training_samples: usize,
    /// Largest feature index seen in training
    pub feature_count: usize,
}

impl SerializableModel {
    /// Snapshot a trained model
    pub fn from_model(model: &SvmModel, training_samples: usize, feature_count: usize) -> Self {
        Self {
            model: model.to_parts(),
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
                training_samples,
                feature_count,
            },
        }
    }

    /// Rebuild the model, checking its shape
    pub fn to_model(&self) -> Result<SvmModel> {
        SvmModel::from_parts(self.model.clone())
    }

    pub fn into_model(self) -> Result<SvmModel> {
        SvmModel::from_parts(self.model)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(SVMError::IoError)?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer)?;
        writer.flush().map_err(SVMError::IoError)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Print model summary
    pub fn print_summary(&self) {
        let parts = &self.model;
        println!("=== SVM Model Summary ===");
        println!("SVM Type: {}", parts.params.formulation.name());
        println!("Kernel Type: {}", parts.params.kernel.name());
        if let Some(gamma) = parts.params.kernel.gamma() {
            println!("Gamma: {}", gamma);
        }
        if !parts.labels.is_empty() {
            println!("Classes: {}", parts.nr_class);
            let labels: Vec<String> = parts.labels.iter().map(|l| l.to_string()).collect();
            println!("Labels: {}", labels.join(" "));
            let n_sv: Vec<String> = parts.n_sv.iter().map(|n| n.to_string()).collect();
            println!("SVs per class: {}", n_sv.join(" "));
        }
        println!("Support Vectors: {}", parts.support_vectors.len());
        let rho: Vec<String> = parts.rho.iter().map(|r| format!("{:.6}", r)).collect();
        println!("Rho: {}", rho.join(" "));
        println!(
            "Probability Model: {}",
            if parts.calibration.is_some() { "yes" } else { "no" }
        );
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Training Samples: {}", self.metadata.training_samples);
        println!("Feature Count: {}", self.metadata.feature_count);
    }
}

/// Save a trained model with metadata
pub fn save_model<P: AsRef<Path>>(
    model: &SvmModel,
    training_samples: usize,
    feature_count: usize,
    path: P,
) -> Result<()> {
    SerializableModel::from_model(model, training_samples, feature_count).save_to_file(path)
}

/// Load a model saved by [`save_model`]
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<SvmModel> {
    SerializableModel::load_from_file(path)?.into_model()
}
