use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One installation of the app into one Slack team.
///
/// `document` is the OAuth exchange response as Slack returned it, with `id`
/// set to the team identifier so the stored document is self-describing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub id: TeamId,
    pub document: Value,
    pub updated_at: DateTime<Utc>,
}

impl AuthorizationRecord {
    /// Builds a record from an OAuth document, deriving the key with
    /// precedence `id`, then `team_id`, then `team.id`.
    pub fn from_document(
        mut document: Value,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let id = derive_record_key(&document).ok_or(DomainError::MissingTeamIdentity)?;
        let Some(fields) = document.as_object_mut() else {
            return Err(DomainError::InvariantViolation(
                "authorization document must be a JSON object".to_owned(),
            ));
        };
        fields.insert("id".to_owned(), Value::String(id.0.clone()));

        Ok(Self { id, document, updated_at })
    }

    pub fn bot_token(&self) -> Option<&str> {
        // oauth.access nests bot credentials; oauth.v2.access issues the bot token at the top level
        self.str_at(&["bot", "bot_access_token"]).or_else(|| {
            (self.str_at(&["token_type"]) == Some("bot"))
                .then(|| self.str_at(&["access_token"]))
                .flatten()
        })
    }

    pub fn user_token(&self) -> Option<&str> {
        self.str_at(&["authed_user", "access_token"]).or_else(|| {
            (self.str_at(&["token_type"]) != Some("bot"))
                .then(|| self.str_at(&["access_token"]))
                .flatten()
        })
    }

    /// Preferred credential for acting on behalf of the installation.
    pub fn access_token(&self) -> Option<&str> {
        self.bot_token().or_else(|| self.user_token())
    }

    pub fn installer_id(&self) -> Option<&str> {
        self.str_at(&["authed_user", "id"]).or_else(|| self.str_at(&["user_id"]))
    }

    pub fn bot_user_id(&self) -> Option<&str> {
        self.str_at(&["bot_user_id"]).or_else(|| self.str_at(&["bot", "bot_user_id"]))
    }

    pub fn team_name(&self) -> Option<&str> {
        self.str_at(&["team", "name"]).or_else(|| self.str_at(&["team_name"]))
    }

    fn str_at(&self, path: &[&str]) -> Option<&str> {
        string_at(&self.document, path)
    }
}

/// Resolves the storage key of an authorization document.
pub fn derive_record_key(document: &Value) -> Option<TeamId> {
    [&["id"][..], &["team_id"][..], &["team", "id"][..]]
        .into_iter()
        .find_map(|path| string_at(document, path))
        .map(|id| TeamId(id.to_owned()))
}

fn string_at<'a>(document: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(document, |value, key| value.get(*key))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}
