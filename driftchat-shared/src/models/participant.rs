use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A chat participant: a stable opaque identifier plus presentation fields.
///
/// Identity generation and storage live with the client (the identity
/// provider is an external collaborator); the rest of the system treats
/// this as opaque data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Stable identifier, unique per participant.
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Short initials shown next to messages.
    pub initials: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let participant = Participant {
            id: "u1".to_string(),
            name: "Robin Hale".to_string(),
            initials: "RH".to_string(),
        };

        let json = serde_json::to_value(&participant).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["name"], "Robin Hale");
        assert_eq!(json["initials"], "RH");
    }
}
