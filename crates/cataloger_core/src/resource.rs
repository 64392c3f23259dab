use std::fmt;
use std::str::FromStr;

/// Kind of node in a service catalog tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceType {
    Server,
    Folder,
    Service,
    Layer,
    Table,
    #[default]
    Unknown,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Server => "server",
            ResourceType::Folder => "folder",
            ResourceType::Service => "service",
            ResourceType::Layer => "layer",
            ResourceType::Table => "table",
            ResourceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource type {0:?}")]
pub struct ParseResourceTypeError(pub String);

impl FromStr for ResourceType {
    type Err = ParseResourceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(ResourceType::Server),
            "folder" => Ok(ResourceType::Folder),
            "service" => Ok(ResourceType::Service),
            "layer" => Ok(ResourceType::Layer),
            "table" => Ok(ResourceType::Table),
            "unknown" => Ok(ResourceType::Unknown),
            other => Err(ParseResourceTypeError(other.to_string())),
        }
    }
}

/// Result of classifying a node: its type plus free-text subtype.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub kind: ResourceType,
    pub subtype: Option<String>,
}

impl Classification {
    pub fn new(kind: ResourceType) -> Self {
        Self {
            kind,
            subtype: None,
        }
    }

    pub fn with_subtype(kind: ResourceType, subtype: impl Into<String>) -> Self {
        Self {
            kind,
            subtype: Some(subtype.into()),
        }
    }
}
