use crate::{Error, Result};
use envizor_inference::inference::classify::{ClassifierOutput, ClassifierProfile, InputScaling};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_SUFFIX: &str = "classes.yaml";

/// Ordered class labels. Index `i` is the label of output logit `i`, so the
/// ordering travels with the weights instead of being repeated at call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames(Vec<String>);

/// Everything inference needs to know about a weights file besides the
/// weights: class order and, for classifiers, the expected pre- and
/// post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Manifest", into = "Manifest")]
pub struct ModelManifest {
    pub classes: ClassNames,
    pub profile: Option<ClassifierProfile>,
}

#[derive(Serialize, Deserialize)]
struct Manifest {
    names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<String>,
}

impl ClassNames {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::class_names("class list is empty"));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.trim().is_empty() {
                return Err(Error::class_names("class name is blank"));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::class_names(format!("duplicate class name '{name}'")));
            }
        }

        Ok(Self(names))
    }

    /// Derives the ordering from the sub-directories of a training split,
    /// sorted by name.
    pub fn from_split(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::not_found("Dataset split", dir));
        }

        let mut names = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect::<Vec<_>>();
        names.sort();

        Self::new(names).map_err(|e| match e {
            Error::ClassNames(msg) => {
                Error::class_names(format!("{msg} (split {})", dir.display()))
            }
            other => other,
        })
    }

    /// `<dir>/<weights stem>.classes.yaml`
    pub fn manifest_path(weights: &Path) -> PathBuf {
        let stem = weights
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        weights.with_file_name(format!("{stem}.{MANIFEST_SUFFIX}"))
    }

    pub fn load_for(weights: &Path) -> Result<Self> {
        ModelManifest::load_for(weights).map(|manifest| manifest.classes)
    }

    pub fn save_for(&self, weights: &Path) -> Result<PathBuf> {
        ModelManifest::new(self.clone(), None).save_for(weights)
    }

    pub fn get(&self, index: usize) -> Result<&str> {
        self.0.get(index).map(String::as_str).ok_or_else(|| {
            Error::class_names(format!(
                "class index {index} outside the {} known classes",
                self.0.len()
            ))
        })
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Fails when the model's output width disagrees with the manifest.
    pub fn check_width(&self, width: usize) -> Result<()> {
        if width == self.0.len() {
            Ok(())
        } else {
            Err(Error::class_names(format!(
                "model produces {width} scores but the manifest lists {} classes",
                self.0.len()
            )))
        }
    }
}

impl ModelManifest {
    pub fn new(classes: ClassNames, profile: Option<ClassifierProfile>) -> Self {
        Self { classes, profile }
    }

    pub fn load_for(weights: &Path) -> Result<Self> {
        let path = ClassNames::manifest_path(weights);
        if !path.is_file() {
            return Err(Error::not_found("Class manifest", path));
        }

        debug!("Loading class manifest from {}", path.display());
        let content = fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save_for(&self, weights: &Path) -> Result<PathBuf> {
        let path = ClassNames::manifest_path(weights);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_yaml::to_string(self)?)?;
        Ok(path)
    }
}

impl TryFrom<Manifest> for ModelManifest {
    type Error = Error;

    fn try_from(value: Manifest) -> Result<Self> {
        let classes = ClassNames::new(value.names)?;
        let profile = if value.output.is_none() && value.input.is_none() {
            None
        } else {
            let output = value
                .output
                .as_deref()
                .map(str::parse::<ClassifierOutput>)
                .transpose()
                .map_err(|e| Error::class_names(format!("{e:#}")))?;
            let input = value
                .input
                .as_deref()
                .map(str::parse::<InputScaling>)
                .transpose()
                .map_err(|e| Error::class_names(format!("{e:#}")))?;
            Some(ClassifierProfile {
                output: output.unwrap_or_default(),
                input: input.unwrap_or_default(),
            })
        };

        Ok(Self { classes, profile })
    }
}

impl From<ModelManifest> for Manifest {
    fn from(value: ModelManifest) -> Self {
        Manifest {
            names: value.classes.0,
            output: value.profile.map(|p| p.output.to_string()),
            input: value.profile.map(|p| p.input.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn manifest_sits_next_to_weights() {
        assert_eq!(
            ClassNames::manifest_path(Path::new("runs/cls/best.onnx")),
            PathBuf::from("runs/cls/best.classes.yaml")
        );
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        assert!(ClassNames::new(Vec::<String>::new()).is_err());
        assert!(ClassNames::new(["illegal", "illegal"]).is_err());
        assert!(ClassNames::new(["illegal", " "]).is_err());
    }

    #[test]
    fn ordering_survives_save_and_load() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let weights = dir.path().join("landfill.onnx");
        let names = ClassNames::new(["illegal", "non_illegal", "no_landfill"])?;

        let path = names.save_for(&weights)?;
        assert!(path.ends_with("landfill.classes.yaml"));

        let loaded = ClassNames::load_for(&weights)?;
        assert_eq!(loaded, names);
        assert_eq!(loaded.get(2)?, "no_landfill");
        assert_eq!(loaded.index_of("non_illegal"), Some(1));
        assert!(loaded.get(3).is_err());
        Ok(())
    }

    #[test]
    fn split_directories_are_sorted() -> anyhow::Result<()> {
        let dir = tempdir()?;
        for class in ["non_illegal", "illegal", "no_landfill"] {
            fs::create_dir(dir.path().join(class))?;
        }
        fs::write(dir.path().join("README.txt"), "not a class")?;

        let names = ClassNames::from_split(dir.path())?;
        assert_eq!(names.names(), ["illegal", "no_landfill", "non_illegal"]);
        Ok(())
    }

    #[test]
    fn width_mismatch_is_reported() -> anyhow::Result<()> {
        let names = ClassNames::new(["a", "b"])?;
        assert!(names.check_width(2).is_ok());
        assert!(matches!(names.check_width(3), Err(Error::ClassNames(_))));
        Ok(())
    }

    #[test]
    fn classifier_profile_travels_with_the_manifest() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let weights = dir.path().join("cls.onnx");
        let profile = ClassifierProfile {
            output: ClassifierOutput::Probabilities,
            input: InputScaling::Unit,
        };

        ModelManifest::new(ClassNames::new(["illegal", "no_landfill"])?, Some(profile))
            .save_for(&weights)?;
        let text = fs::read_to_string(ClassNames::manifest_path(&weights))?;
        assert!(text.contains("output: probabilities"));
        assert!(text.contains("input: unit"));

        let manifest = ModelManifest::load_for(&weights)?;
        assert_eq!(manifest.profile, Some(profile));
        assert_eq!(ClassNames::load_for(&weights)?.len(), 2);
        Ok(())
    }

    #[test]
    fn names_only_manifest_has_no_profile() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let weights = dir.path().join("resnet.onnx");
        fs::write(ClassNames::manifest_path(&weights), "names: [a, b]\n")?;
        assert_eq!(ModelManifest::load_for(&weights)?.profile, None);

        fs::write(ClassNames::manifest_path(&weights), "names: [a]\noutput: softmax\n")?;
        assert!(ModelManifest::load_for(&weights).is_err());
        Ok(())
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let err = ClassNames::load_for(Path::new("/nonexistent/model.onnx")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
