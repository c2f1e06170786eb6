#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TodoError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Answers "who is signed in" without touching the network.
pub trait AuthProvider {
    fn is_authenticated(&self) -> bool;
    fn user(&self) -> Option<&User>;
    fn token(&self) -> Option<&str>;
    fn logout(&mut self) -> Result<(), TodoError>;

    fn require_user(&self) -> Result<&User, TodoError> {
        self.user().ok_or(TodoError::NotAuthenticated)
    }
}

/// Session cached in a JSON file, read once at construction.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    path: PathBuf,
    session: Option<Session>,
}

impl SessionAuth {
    pub fn load(path: PathBuf) -> Result<Self, TodoError> {
        if !path.exists() {
            return Ok(Self {
                path,
                session: None,
            });
        }
        let data = std::fs::read(&path).map_err(|source| TodoError::IoPath {
            path: path.clone(),
            source,
        })?;
        let session: Session = serde_json::from_slice(&data).map_err(|e| {
            TodoError::Other(format!("corrupt session file {}: {e}", path.display()))
        })?;
        let session = (!session.token.trim().is_empty() && !session.user.id.trim().is_empty())
            .then_some(session);
        Ok(Self { path, session })
    }

    pub fn login(path: PathBuf, session: Session) -> Result<Self, TodoError> {
        if session.user.id.trim().is_empty() {
            return Err(TodoError::Validation("user id is required".to_owned()));
        }
        if session.token.trim().is_empty() {
            return Err(TodoError::Validation("token is required".to_owned()));
        }
        write_session(&path, &session)?;
        tracing::info!(user_id = %session.user.id, path = %path.display(), "session saved");
        Ok(Self {
            path,
            session: Some(session),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthProvider for SessionAuth {
    fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    fn logout(&mut self) -> Result<(), TodoError> {
        self.session = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "session removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TodoError::IoPath {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn write_session(path: &Path, session: &Session) -> Result<(), TodoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(session)
        .map_err(|e| TodoError::Other(format!("failed to encode session: {e}")))?;
    std::fs::write(&tmp, &data).map_err(io_err(&tmp))?;
    restrict_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> TodoError + use<> {
    let path = path.to_path_buf();
    move |source| TodoError::IoPath { path, source }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), TodoError> {
    use std::os::unix::fs::PermissionsExt as _;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
        TodoError::IoPath {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), TodoError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            token: "tok".to_owned(),
            user: User {
                id: "usr_1".to_owned(),
                name: "Ada".to_owned(),
                email: "ada@example.com".to_owned(),
            },
        }
    }

    #[test]
    fn missing_session_file_is_unauthenticated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let auth = SessionAuth::load(dir.path().join("session.json")).unwrap();
        assert!(!auth.is_authenticated());
        assert!(matches!(
            auth.require_user(),
            Err(TodoError::NotAuthenticated)
        ));
    }

    #[test]
    fn login_persists_and_logout_removes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("session.json");

        let auth = SessionAuth::login(path.clone(), session()).unwrap();
        assert!(auth.is_authenticated());

        let mut reloaded = SessionAuth::load(path.clone()).unwrap();
        assert_eq!(reloaded.user().map(|u| u.id.as_str()), Some("usr_1"));
        assert_eq!(reloaded.token(), Some("tok"));

        reloaded.logout().unwrap();
        assert!(!reloaded.is_authenticated());
        assert!(!path.exists());
        reloaded.logout().unwrap();
    }

    #[test]
    fn login_requires_user_and_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut s = session();
        s.token = " ".to_owned();
        assert!(SessionAuth::login(dir.path().join("s.json"), s).is_err());
    }
}
