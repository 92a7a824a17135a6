//! Resolution of a `(user, character)` pair presented by a caller.
//!
//! The engine only ever sees character ids. The service layer asks an
//! [`Authenticator`] whether the user may play the character before handing
//! the id down.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A character the caller is allowed to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: u64,
    pub character: u64,
    pub region: String,
}

pub trait Authenticator: Send + Sync {
    /// Fails with `invalid-argument` on zero ids, `not-found` for an unknown
    /// user and `permission-denied` for a suspended user or a character
    /// owned by someone else.
    fn character(&self, user: u64, character: u64) -> Result<Session>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: u64,
    pub region: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub off: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suspended: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// In-memory user table.
#[derive(Debug, Default)]
pub struct StaticAuthenticator {
    users: BTreeMap<u64, User>,
}

impl StaticAuthenticator {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    /// Read a JSON array of users.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let users: Vec<User> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))?;
        Ok(Self::new(users))
    }

    pub fn suspend(&mut self, user: u64) -> Result<()> {
        let u = self
            .users
            .get_mut(&user)
            .filter(|u| !u.deleted)
            .ok_or_else(|| Error::not_found("user", user))?;
        u.suspended = true;
        Ok(())
    }
}

impl Authenticator for StaticAuthenticator {
    fn character(&self, user: u64, character: u64) -> Result<Session> {
        if user == 0 || character == 0 {
            return Err(Error::InvalidArgument("invalid user or character id".to_string()));
        }
        let u = self
            .users
            .get(&user)
            .filter(|u| !u.deleted)
            .ok_or_else(|| Error::not_found("user", user))?;
        if u.suspended {
            return Err(Error::PermissionDenied(format!("user {user} suspended")));
        }
        let c = u
            .characters
            .iter()
            .find(|c| c.id == character && !c.deleted)
            .ok_or_else(|| Error::PermissionDenied(format!("character {character} not owned by user {user}")))?;
        if c.off {
            return Err(Error::PermissionDenied(format!("character {character} is off")));
        }
        Ok(Session {
            user,
            character,
            region: c.region.clone(),
        })
    }
}

/// Accepts every pair and binds it to no region. For tools and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustingAuthenticator;

impl Authenticator for TrustingAuthenticator {
    fn character(&self, user: u64, character: u64) -> Result<Session> {
        Ok(Session {
            user,
            character,
            region: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn auth() -> StaticAuthenticator {
        StaticAuthenticator::new([
            User {
                id: 1,
                name: "ann".into(),
                characters: vec![
                    Character {
                        id: 10,
                        region: "north".into(),
                        name: "Ann the Bold".into(),
                        off: false,
                        deleted: false,
                    },
                    Character {
                        id: 11,
                        region: "north".into(),
                        name: "Ann the Idle".into(),
                        off: true,
                        deleted: false,
                    },
                ],
                suspended: false,
                deleted: false,
            },
            User {
                id: 2,
                name: "bob".into(),
                characters: vec![],
                suspended: true,
                deleted: false,
            },
        ])
    }

    #[test]
    fn resolves_owned_characters() {
        let session = auth().character(1, 10).unwrap();
        assert_eq!(session.region, "north");
        assert_eq!(session.character, 10);
    }

    #[test]
    fn rejections() {
        let auth = auth();
        assert_eq!(auth.character(0, 10).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(auth.character(9, 10).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(auth.character(2, 10).unwrap_err().kind(), ErrorKind::PermissionDenied);
        assert_eq!(auth.character(1, 12).unwrap_err().kind(), ErrorKind::PermissionDenied);
        assert_eq!(auth.character(1, 11).unwrap_err().kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn suspension_takes_effect() {
        let mut auth = auth();
        auth.suspend(1).unwrap();
        assert_eq!(auth.character(1, 10).unwrap_err().kind(), ErrorKind::PermissionDenied);
        assert_eq!(auth.suspend(7).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn loads_users_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"[{"id": 3, "characters": [{"id": 30, "region": "south"}]}]"#).unwrap();
        let auth = StaticAuthenticator::load(&path).unwrap();
        assert_eq!(auth.character(3, 30).unwrap().region, "south");
    }
}
