use crate::error::ModelError;
use uuid::Uuid;

/// Join code identifying a watch party.
///
/// Six characters from an alphabet without confusable glyphs (0, O, I, 1),
/// so codes survive being read out loud over a call.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct PartyId(String);

const PARTY_CODE_LEN: usize = 6;
const PARTY_CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

impl PartyId {
    /// Generate a fresh random join code.
    pub fn generate() -> Self {
        use rand::Rng;

        let mut rng = rand::rng();
        let code = (0..PARTY_CODE_LEN)
            .map(|_| {
                PARTY_CODE_CHARS[rng.random_range(0..PARTY_CODE_CHARS.len())]
                    as char
            })
            .collect();
        PartyId(code)
    }

    /// Parse a user-supplied code, normalizing case.
    pub fn parse(code: &str) -> Result<Self, ModelError> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != PARTY_CODE_LEN
            || !code.bytes().all(|b| PARTY_CODE_CHARS.contains(&b))
        {
            return Err(ModelError::InvalidPartyCode(code));
        }
        Ok(PartyId(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PartyId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartyId::parse(s)
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn to_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(
                &self,
                f: &mut std::fmt::Formatter<'_>,
            ) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Strongly typed ID for platform user accounts
    UserId
}

uuid_id! {
    /// Strongly typed ID for viewing profiles under an account
    ProfileId
}

uuid_id! {
    /// Strongly typed ID for catalog content (movies and series)
    ContentId
}

uuid_id! {
    /// Strongly typed ID for series episodes
    EpisodeId
}
