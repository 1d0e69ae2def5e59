use foundation::ids::ModelId;

/// Configuration errors. These are programming or catalog-definition
/// mistakes: they are reported immediately and never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownStratum(String),
    UnknownTrait { model_type: String, trait_name: String },
    UnknownModel(ModelId),
    UnknownModelType(String),
    DuplicateModel(ModelId),
    InvalidReference { group: ModelId, member: ModelId },
    InvalidJson(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::UnknownStratum(name) => write!(f, "unknown stratum: {name}"),
            ModelError::UnknownTrait {
                model_type,
                trait_name,
            } => write!(f, "model type `{model_type}` has no trait `{trait_name}`"),
            ModelError::UnknownModel(id) => write!(f, "no model with id `{id}`"),
            ModelError::UnknownModelType(t) => write!(f, "unknown model type `{t}`"),
            ModelError::DuplicateModel(id) => write!(f, "a model with id `{id}` already exists"),
            ModelError::InvalidReference { group, member } => {
                write!(f, "Invalid reference: `{member}` is not a member of `{group}`")
            }
            ModelError::InvalidJson(msg) => write!(f, "invalid catalog JSON: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}
