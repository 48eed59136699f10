// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The shared-secret credential store consulted by the login gate.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::assets;

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("unable to read credentials from {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("packaged credentials are missing")]
    MissingPackaged,

    #[error("credentials from {0} are not valid UTF-8")]
    Encoding(String),
}

/// Client id to password mapping. Immutable once loaded.
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: HashMap<String, String>,
}

impl CredentialStore {
    /// Parses a credential source. Each line holds `<id> <password>` separated
    /// by whitespace; blank lines and lines starting with `#` are skipped, as
    /// are lines with fewer than two fields.
    pub fn parse(source: &str) -> CredentialStore {
        let entries = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                match (fields.next(), fields.next()) {
                    (Some(id), Some(password)) => Some((id.to_string(), password.to_string())),
                    _ => None,
                }
            })
            .collect();

        CredentialStore { entries }
    }

    /// Loads credentials from a file on disk.
    pub fn load(path: &Path) -> Result<CredentialStore, CredentialsError> {
        let source = fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::parse(&source);
        info!(path = ?path, entries = store.len(), "Loaded credentials.");
        Ok(store)
    }

    /// Loads the credentials packaged with the binary.
    pub fn packaged() -> Result<CredentialStore, CredentialsError> {
        let data = assets::get(assets::CREDENTIALS).ok_or(CredentialsError::MissingPackaged)?;
        let source = std::str::from_utf8(&data)
            .map_err(|_| CredentialsError::Encoding(assets::CREDENTIALS.to_string()))?;
        let store = Self::parse(source);
        info!(entries = store.len(), "Loaded packaged credentials.");
        Ok(store)
    }

    /// Loads credentials from the given file, or the packaged ones if None.
    pub fn from_path(path: Option<&Path>) -> Result<CredentialStore, CredentialsError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::packaged(),
        }
    }

    /// Returns true if the id is known and the password matches.
    pub fn verify(&self, id: &str, password: &str) -> bool {
        self.entries
            .get(id)
            .is_some_and(|expected| expected == password)
    }

    /// Returns the number of known client ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no client can log in.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
