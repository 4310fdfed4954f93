use serde::{Deserialize, Serialize};

pub type OwnerId = u64;

/// Authenticated account holder, as handed over by the identity provider.
/// The ledger only keeps the opaque id and a name for transfer descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub display_name: String,
}

impl Owner {
    pub fn new(id: OwnerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}
