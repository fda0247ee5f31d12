//! NUT-06: Mint information

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Mint software name and version, on the wire as `"name/version"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintVersion {
    /// Implementation name
    pub name: String,
    /// Version string
    pub version: String,
}

impl Serialize for MintVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let combined = format!("{}/{}", self.name, self.version);
        serializer.serialize_str(&combined)
    }
}

impl<'de> Deserialize<'de> for MintVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let combined = String::deserialize(deserializer)?;
        let (name, version) = combined
            .split_once('/')
            .ok_or_else(|| serde::de::Error::custom("Invalid version string"))?;
        Ok(MintVersion {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

/// Mint metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    /// Recognizable mint name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Implementation name and running version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<MintVersion>,
    /// Short description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Message of the day for wallets to display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
}
