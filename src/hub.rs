use std::path::PathBuf;

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};

use crate::Error;

/// Resolves a file in a remote model repository to a local path.
pub trait ArtifactFetcher {
    fn fetch(&self, repo_id: &str, filename: &str) -> Result<PathBuf, Error>;
}

/// Downloads through the Hugging Face hub cache.
pub struct HubFetcher {
    revision: String,
    token: Option<String>,
}

impl Default for HubFetcher {
    fn default() -> Self {
        Self::new("main")
    }
}

impl HubFetcher {
    pub fn new(revision: &str) -> Self {
        Self {
            revision: revision.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

fn validate_identifier(kind: &str, identifier: &str) -> Result<(), Error> {
    let valid_chars = ['-', '_', '.', '/'];
    let is_valid_char = |x: char| x.is_alphanumeric() || valid_chars.contains(&x);
    if identifier.is_empty() || !identifier.chars().all(is_valid_char) {
        return Err(Error::InvalidRepoIdError(format!(
            "{kind} \"{identifier}\" contains invalid characters, expected only alphanumeric or '-', '_', '.', '/'"
        )));
    }
    Ok(())
}

impl ArtifactFetcher for HubFetcher {
    fn fetch(&self, repo_id: &str, filename: &str) -> Result<PathBuf, Error> {
        validate_identifier("Model", repo_id)?;
        validate_identifier("Revision", &self.revision)?;

        let mut builder = ApiBuilder::new().with_progress(true);
        if let Some(token) = &self.token {
            builder = builder.with_token(Some(token.clone()));
        }
        let api = builder.build()?;
        let repo = Repo::with_revision(repo_id.to_string(), RepoType::Model, self.revision.clone());
        tracing::info!("Fetching {} from {}@{}", filename, repo_id, self.revision);
        Ok(api.repo(repo).get(filename)?)
    }
}
