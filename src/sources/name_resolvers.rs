//! Name-to-structure resolver backends behind the Name Resolver,
//! grounded in the original corpus's `get_smiles_from_name`
//! (`pubchempy.get_compounds(identifier, 'name')`).
use crate::error::Result;
use crate::resolver::ResolverBackend;
use serde::Deserialize;
use urlencoding::encode;

/// Primary resolver: PubChem's name-to-SMILES property lookup.
pub struct PubChemNameResolver {
    client: reqwest::Client,
    base_url: String,
}

impl PubChemNameResolver {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[derive(Deserialize)]
struct PropertyTable {
    #[serde(rename = "PropertyTable")]
    property_table: Option<PropertyTableInner>,
}

#[derive(Deserialize)]
struct PropertyTableInner {
    #[serde(rename = "Properties")]
    properties: Vec<PropertyEntry>,
}

#[derive(Deserialize)]
struct PropertyEntry {
    #[serde(rename = "CanonicalSMILES")]
    canonical_smiles: Option<String>,
}

#[async_trait::async_trait]
impl ResolverBackend for PubChemNameResolver {
    async fn resolve(&self, name: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/compound/name/{}/property/CanonicalSMILES/JSON",
            self.base_url.trim_end_matches('/'),
            encode(name),
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let parsed: PropertyTable = response.json().await?;
        Ok(parsed
            .property_table
            .and_then(|t| t.properties.into_iter().next())
            .and_then(|p| p.canonical_smiles))
    }
}

/// Fallback resolver: a second compound registry endpoint, queried only
/// when the primary resolver found nothing. Configured independently so
/// an operator can point it at a mirror or a different vendor.
pub struct SecondaryNameResolver {
    client: reqwest::Client,
    base_url: String,
}

impl SecondaryNameResolver {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait::async_trait]
impl ResolverBackend for SecondaryNameResolver {
    async fn resolve(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/resolve?name={}", self.base_url.trim_end_matches('/'), encode(name));
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let body: serde_json::Value = response.json().await?;
        Ok(body
            .get("structural_key")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }
}
