use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("at most 3 projects can be featured")]
    FeaturedCapReached,

    #[error("email is already subscribed")]
    AlreadySubscribed,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("invalid staged image in {0}")]
    InvalidImage(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}
