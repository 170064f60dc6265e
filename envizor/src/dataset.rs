use crate::labels::ClassNames;
use crate::{Error, Result};
use envizor_media::scan::{scan_images, CLASSIFY_EXTENSIONS};
use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One image of a labelled split, `<split>/<class>/<file>`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledImage {
    pub path: PathBuf,
    pub label: usize,
}

#[derive(Debug, Clone)]
pub struct LabeledSplit {
    pub root: PathBuf,
    pub images: Vec<LabeledImage>,
}

impl LabeledSplit {
    /// Collects the images of every class directory under `root`. Directory
    /// names are resolved against `classes`; an unknown one is an error since
    /// it would be scored against the wrong logit.
    pub fn scan(root: &Path, classes: &ClassNames) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::not_found("Dataset split", root));
        }

        let mut class_dirs = fs::read_dir(root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect::<Vec<_>>();
        class_dirs.sort();

        let mut images = Vec::new();
        for dir in class_dirs {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let label = classes.index_of(&name).ok_or_else(|| {
                Error::class_names(format!(
                    "split directory '{name}' is not one of {:?}",
                    classes.names()
                ))
            })?;

            let files = scan_images(&dir, CLASSIFY_EXTENSIONS)?;
            debug!("{}: {} image(s) labelled '{name}'", root.display(), files.len());
            images.extend(files.into_iter().map(|path| LabeledImage { path, label }));
        }

        if images.is_empty() {
            return Err(Error::NoImages(root.to_path_buf()));
        }

        Ok(Self {
            root: root.to_path_buf(),
            images,
        })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DataNames {
    List(Vec<String>),
    Map(BTreeMap<usize, String>),
}

/// The subset of a YOLO `data.yaml` the pipelines read.
#[derive(Debug, Clone, Deserialize)]
pub struct DataYaml {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub train: Option<PathBuf>,
    #[serde(default)]
    pub val: Option<PathBuf>,
    #[serde(default)]
    pub test: Option<PathBuf>,
    #[serde(default)]
    pub names: Option<DataNames>,
    #[serde(skip)]
    location: PathBuf,
}

impl DataYaml {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::not_found("Data YAML", path));
        }

        let content = fs::read_to_string(path)?;
        let mut data: DataYaml = serde_yaml::from_str(&content)?;
        data.location = path.to_path_buf();
        Ok(data)
    }

    /// Resolves a split entry. Relative entries are taken against `path`
    /// when present, otherwise against the directory holding the YAML.
    pub fn resolve_split(&self, split: &str) -> Option<PathBuf> {
        let entry = match split {
            "train" => self.train.as_ref(),
            "val" => self.val.as_ref(),
            "test" => self.test.as_ref(),
            _ => None,
        }?;

        if entry.is_absolute() {
            return Some(entry.clone());
        }

        let yaml_dir = self
            .location
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let base = match &self.path {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => yaml_dir.join(root),
            None => yaml_dir,
        };
        Some(base.join(entry))
    }

    pub fn class_names(&self) -> Result<ClassNames> {
        match &self.names {
            Some(DataNames::List(names)) => ClassNames::new(names.clone()),
            Some(DataNames::Map(map)) => {
                if map.keys().copied().ne(0..map.len()) {
                    return Err(Error::class_names(
                        "data YAML class ids must be contiguous from 0",
                    ));
                }
                ClassNames::new(map.values().cloned())
            }
            None => Err(Error::class_names(format!(
                "{} has no 'names' entry",
                self.location.display()
            ))),
        }
    }
}
