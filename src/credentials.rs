use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const CREDENTIALS_FILE: &str = "credentials.toml";
const APP_DIR: &str = "study_stats";

#[derive(Debug, Error)]
pub enum CredentialsError {
	#[error("io error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse stored credentials: {0}")]
	Decode(#[from] toml::de::Error),
	#[error("failed to encode credentials: {0}")]
	Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
	pub token: String,
	pub email: Option<String>,
	pub saved_at: DateTime<Utc>,
}

impl StoredCredentials {
	pub fn new(token: impl Into<String>, email: Option<String>) -> Self {
		Self {
			token: token.into(),
			email,
			saved_at: Utc::now(),
		}
	}
}

pub fn load_credentials(path: &Path) -> Result<Option<StoredCredentials>, CredentialsError> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
		Err(source) => {
			return Err(CredentialsError::Io {
				path: path.to_path_buf(),
				source,
			});
		}
	};

	if raw.trim().is_empty() {
		return Ok(None);
	}

	Ok(Some(toml::from_str(&raw)?))
}

pub fn save_credentials(path: &Path, credentials: &StoredCredentials) -> Result<(), CredentialsError> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			fs::create_dir_all(parent).map_err(|source| CredentialsError::Io {
				path: parent.to_path_buf(),
				source,
			})?;
		}
	}

	let contents = toml::to_string(credentials)?;
	fs::write(path, contents).map_err(|source| CredentialsError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	debug!(path = %path.display(), "stored credentials");
	Ok(())
}

pub fn clear_credentials(path: &Path) -> Result<(), CredentialsError> {
	match fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
		Err(source) => Err(CredentialsError::Io {
			path: path.to_path_buf(),
			source,
		}),
	}
}

pub fn credentials_path() -> PathBuf {
	state_dir().join(CREDENTIALS_FILE)
}

fn state_dir() -> PathBuf {
	if let Some(path) = env::var_os("STUDY_STATS_STATE_DIR") {
		return PathBuf::from(path);
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join(APP_DIR);
	}

	PathBuf::from(".study_stats")
}
