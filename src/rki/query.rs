//! ArcGIS query endpoints and wire payloads for the institute dashboard.
//!
//! Responses arrive as `{"features": [{"attributes": {...}}]}` with German
//! attribute names; serde renames map them onto the crate's vocabulary.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::fetch::{http_client, FetchError};

pub const DEFAULT_QUERY_BASE_URL: &str =
    "https://services7.arcgis.com/mOBPykOjAyBO2ZKk/ArcGIS/rest/services/RKI_COVID19/FeatureServer/0";

const CASE_FIELDS: &str = "Bundesland%2CLandkreis%2CAltersgruppe%2CGeschlecht%2CAnzahlFall%2CAnzahlTodesfall%2CMeldedatum%2CNeuerFall%2CRefdatum%2CNeuGenesen%2CAnzahlGenesen";

fn district_ids_url(base_url: &str) -> String {
    format!("{base_url}/query?where=0%3D0&outFields=IdLandkreis&returnDistinctValues=true&f=pjson")
}

fn district_cases_url(base_url: &str, district_id: &str) -> String {
    format!("{base_url}/query?where=IdLandkreis%3D{district_id}&outFields={CASE_FIELDS}&f=pjson")
}

// The inferred derive bounds would demand `A: Default` because of the
// defaulted field; only `A: Deserialize` is actually needed.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "A: Deserialize<'de>"))]
struct QueryResponse<A> {
    #[serde(default)]
    features: Vec<Feature<A>>,
}

#[derive(Debug, Deserialize)]
struct Feature<A> {
    attributes: A,
}

#[derive(Debug, Deserialize)]
struct DistrictIdAttributes {
    #[serde(rename = "IdLandkreis", alias = "idLandkreis")]
    id: String,
}

/// One case-report row as the dashboard publishes it. Timestamps are
/// millisecond epochs; count fields may be negative correction records.
#[derive(Debug, Deserialize)]
pub(crate) struct CaseAttributes {
    #[serde(rename = "Bundesland")]
    pub state: String,
    #[serde(rename = "Landkreis")]
    pub district: String,
    #[serde(rename = "Altersgruppe", default)]
    pub age_group: String,
    #[serde(rename = "Geschlecht", default)]
    pub sex: String,
    #[serde(rename = "AnzahlFall", default)]
    pub cases: i64,
    #[serde(rename = "AnzahlTodesfall", default)]
    pub deaths: i64,
    #[serde(rename = "AnzahlGenesen", default)]
    pub recovered: i64,
    #[serde(rename = "NeuerFall", default)]
    pub new_case_flag: i64,
    #[serde(rename = "NeuGenesen", default)]
    pub new_recovered_flag: i64,
    #[serde(rename = "Meldedatum")]
    pub report_stamp_ms: i64,
    #[serde(rename = "Refdatum")]
    pub reference_stamp_ms: i64,
}

/// Blocking client for the query endpoint, shared across the discovery call
/// and every per-district call of one retrieval.
pub(crate) struct QueryClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl QueryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = http_client().map_err(|source| FetchError::Http {
            url: base_url.clone(),
            source,
        })?;
        Ok(Self { base_url, client })
    }

    /// Distinct district identifiers known to the dashboard.
    pub fn district_ids(&self) -> Result<Vec<String>, FetchError> {
        let url = district_ids_url(&self.base_url);
        let rows: Vec<DistrictIdAttributes> = self.query(&url)?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// Every case-report row for one district.
    pub fn district_cases(&self, district_id: &str) -> Result<Vec<CaseAttributes>, FetchError> {
        let url = district_cases_url(&self.base_url, district_id);
        self.query(&url)
    }

    fn query<A: DeserializeOwned>(&self, url: &str) -> Result<Vec<A>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        let payload: QueryResponse<A> = response.json().map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(payload
            .features
            .into_iter()
            .map(|feature| feature.attributes)
            .collect())
    }
}
