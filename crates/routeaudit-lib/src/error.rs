use std::path::PathBuf;

use thiserror::Error;

use crate::model::RelationId;

/// Convenient result alias for the route audit library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A relation references a member that is not part of its expansion.
    #[error("relation {relation} is malformed: missing {missing}")]
    MalformedRelation { relation: RelationId, missing: String },

    /// The collaborator that supplies relation expansions failed.
    #[error("failed to fetch relation {relation}: {message}")]
    DataFetch {
        relation: RelationId,
        message: String,
    },

    /// Raised when a relation id is not present in the loaded graph.
    #[error("unknown route relation {id}")]
    UnknownRoute { id: RelationId },

    /// Raised when a route category name could not be parsed.
    #[error("unknown route category: {name}{}", format_suggestions(.suggestions))]
    UnknownCategory {
        name: String,
        suggestions: Vec<String>,
    },

    /// Raised when configuration values are out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Raised when a configuration file could not be parsed.
    #[error("failed to parse configuration file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Raised when a reference feature has no usable geometry or identifier.
    #[error("invalid reference feature: {message}")]
    InvalidReferenceFeature { message: String },

    /// Raised when an input file does not follow the expected element layout.
    #[error("unsupported graph document {path}: {message}")]
    UnsupportedGraph { path: PathBuf, message: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON decoding errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for GeoJSON decoding errors.
    #[error(transparent)]
    GeoJson(#[from] geojson::Error),
}

impl Error {
    /// Relation this error is attributed to, if any.
    pub fn relation(&self) -> Option<RelationId> {
        match self {
            Error::MalformedRelation { relation, .. } | Error::DataFetch { relation, .. } => {
                Some(*relation)
            }
            Error::UnknownRoute { id } => Some(*id),
            _ => None,
        }
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else if suggestions.len() == 1 {
        format!(". Did you mean '{}'?", suggestions[0])
    } else {
        format!(
            ". Did you mean one of: {}?",
            suggestions
                .iter()
                .map(|s| format!("'{}'", s))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
