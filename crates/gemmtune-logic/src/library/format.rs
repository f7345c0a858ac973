use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::LibraryError;

/// File format of logic files and libraries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryFormat {
    #[default]
    Yaml,
    Json,
}

impl LibraryFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LibraryFormat::Yaml => "yaml",
            LibraryFormat::Json => "json",
        }
    }

    /// The format of a file, from its extension.
    pub fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(LibraryFormat::Yaml),
            "json" => Some(LibraryFormat::Json),
            _ => None,
        }
    }

    pub fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T, LibraryError> {
        let content = std::fs::read_to_string(path).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |reason: String| LibraryError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        match self {
            LibraryFormat::Yaml => serde_yaml::from_str(&content).map_err(|err| parse_error(err.to_string())),
            LibraryFormat::Json => serde_json::from_str(&content).map_err(|err| parse_error(err.to_string())),
        }
    }

    pub fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), LibraryError> {
        let serialize_error = |reason: String| LibraryError::Serialize {
            path: path.to_path_buf(),
            reason,
        };
        let content = match self {
            LibraryFormat::Yaml => {
                serde_yaml::to_string(value).map_err(|err| serialize_error(err.to_string()))?
            }
            LibraryFormat::Json => serde_json::to_string_pretty(value)
                .map_err(|err| serialize_error(err.to_string()))?,
        };

        std::fs::write(path, content).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl core::str::FromStr for LibraryFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(LibraryFormat::Yaml),
            "json" => Ok(LibraryFormat::Json),
            // msgpack libraries are written as json.
            "msgpack" => Ok(LibraryFormat::Json),
            other => Err(format!("Unknown library format {other}")),
        }
    }
}
