use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};

#[derive(Debug, Error)]
pub enum YamlFileError {
    #[error("File {0} does not exist")]
    NotFound(PathBuf),
    #[error("Failed to read file: {0}")]
    ReadFail(String),
    #[error("Failed to parse file: {0}")]
    ParseFail(String),
    #[error("Failed to save file: {0}")]
    SaveFail(String),
}

/// A value mirrored in a YAML document on disk.
pub struct YamlFile<Struct: Serialize + DeserializeOwned> {
    data: Struct,
    path: PathBuf,
}

impl<Struct: Serialize + DeserializeOwned> YamlFile<Struct> {
    pub async fn open(path: &Path) -> Result<Self, YamlFileError> {
        let data = read_yaml(path).await?;
        Ok(Self {
            data,
            path: path.to_path_buf(),
        })
    }

    pub async fn reload(&mut self) -> Result<(), YamlFileError> {
        self.data = read_yaml(&self.path).await?;
        Ok(())
    }

    /// Readers never observe a half written document: the content goes to a
    /// sibling temporary file which is then renamed over the target.
    pub async fn save(&self) -> Result<(), YamlFileError> {
        let yaml = serde_yaml::to_string(&self.data)
            .map_err(|err| YamlFileError::SaveFail(err.to_string()))?;
        let temporary = temporary_path(&self.path);
        let mut file = fs::File::create(&temporary)
            .await
            .map_err(|err| YamlFileError::SaveFail(err.to_string()))?;
        file.write_all(yaml.as_bytes())
            .await
            .map_err(|err| YamlFileError::SaveFail(err.to_string()))?;
        file.sync_all()
            .await
            .map_err(|err| YamlFileError::SaveFail(err.to_string()))?;
        fs::rename(&temporary, &self.path)
            .await
            .map_err(|err| YamlFileError::SaveFail(err.to_string()))
    }

    pub fn get(&self) -> &Struct {
        &self.data
    }

    pub fn get_mut(&mut self) -> &mut Struct {
        &mut self.data
    }
}

/// Reads and decodes a YAML document without keeping a handle to it.
pub async fn read_yaml<Struct: DeserializeOwned>(path: &Path) -> Result<Struct, YamlFileError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(YamlFileError::NotFound(path.to_path_buf()))
        }
        Err(err) => return Err(YamlFileError::ReadFail(err.to_string())),
    };
    serde_yaml::from_str(&content).map_err(|err| YamlFileError::ParseFail(err.to_string()))
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
