//! Remote compound registry lookup backing the Availability Oracle,
//! grounded in the original corpus's PubChem `pubchempy.get_compounds`
//! call and the teacher's `enrich_structure` GET-plus-JSON pattern.
use crate::availability::RegistryBackend;
use crate::error::Result;
use serde::Deserialize;
use urlencoding::encode;

pub struct PubChemRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl PubChemRegistry {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[derive(Deserialize)]
struct PugRestIdentifiers {
    #[serde(rename = "IdentifierList")]
    identifier_list: Option<IdentifierList>,
}

#[derive(Deserialize)]
struct IdentifierList {
    #[serde(rename = "CID")]
    cid: Vec<u64>,
}

#[async_trait::async_trait]
impl RegistryBackend for PubChemRegistry {
    /// Looks `structural_key` up by SMILES first, falling back to a
    /// name search if no compound matches as a structure (mirrors the
    /// original's `get_compounds(identifier, 'smiles')` then
    /// `get_compounds(identifier, 'name')` fallback).
    async fn is_registered(&self, structural_key: &str) -> Result<bool> {
        if self.lookup(structural_key, "smiles").await? {
            return Ok(true);
        }
        self.lookup(structural_key, "name").await
    }
}

impl PubChemRegistry {
    async fn lookup(&self, identifier: &str, namespace: &str) -> Result<bool> {
        let url = format!(
            "{}/compound/{}/{}/cids/JSON",
            self.base_url.trim_end_matches('/'),
            namespace,
            encode(identifier),
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = response.error_for_status()?;
        let parsed: PugRestIdentifiers = response.json().await?;
        Ok(parsed
            .identifier_list
            .map(|list| !list.cid.is_empty())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_passthrough_alnum() {
        assert_eq!(encode("abc123"), "abc123");
    }

    #[test]
    fn test_encode_escapes_special_chars() {
        assert_eq!(encode("C=C"), "C%3DC");
    }
}
