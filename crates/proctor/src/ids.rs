//! Identifier newtypes shared across the sandbox, store, and recorder layers.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// The interview candidate a sandbox, recording, or outcome belongs to.
    CandidateId
);

string_id!(
    /// A provisioned remote execution environment.
    SandboxId
);

string_id!(
    /// A session recording (the container for a candidate's session events).
    RecordingId
);

impl RecordingId {
    /// Generate a fresh random recording id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = CandidateId::new("cand-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cand-1\"");
        let back: CandidateId = serde_json::from_str("\"cand-1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn generated_recording_ids_are_unique() {
        assert_ne!(RecordingId::generate(), RecordingId::generate());
    }
}
