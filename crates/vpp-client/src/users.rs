//! VPP user management.
//!
//! A VPP user is the account-side record that licenses are assigned to. It
//! is keyed by the caller-chosen `clientUserIdStr` (normally the identity
//! platform's UUID), by the service-assigned `userId`, or by the hash of the
//! Apple ID once the user has accepted the invitation.
//!
//! | Operation key | Verb |
//! |---------------|------|
//! | `registerUserSrvUrl` | [`UsersClient::register`] |
//! | `getUserSrvUrl` | [`UsersClient::get`] |
//! | `getUsersSrvUrl` | [`UsersClient::list`], [`UsersClient::list_all`] |
//! | `retireUserSrvUrl` | [`UsersClient::retire`] |
//! | `editUserSrvUrl` | [`UsersClient::edit`] |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::{BatchCursor, Page, PageTokens, PagedResponse, TokenTrail};
use crate::error::VppError;
use crate::service_config::Operation;
use crate::session::Session;

// -- Types matching VPP wire schemas -------------------------------------------

/// Registration status of a VPP user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Registered but the invitation has not been accepted.
    Registered,
    /// Associated with an Apple ID.
    Associated,
    /// Retired; revocable licenses were released.
    Retired,
    /// Forward-compatible catch-all.
    #[serde(other)]
    Unknown,
}

/// A VPP user record.
///
/// In most cases `client_user_id_str` should be used over `user_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VppUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_user_id_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RegistrationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    /// Empty until an Apple ID has been associated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub its_id_hash: Option<String>,
}

impl VppUser {
    /// A new user to register. Generates a random client id when `client_user_id`
    /// is `None`; normally pass the id that is authoritative for your identity platform.
    pub fn new(email: impl Into<String>, client_user_id: Option<&str>) -> Self {
        let id = client_user_id
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            client_user_id_str: Some(id),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// The key that identifies this user in requests.
    pub fn key(&self) -> Result<UserKey, VppError> {
        UserKey::of(self)
    }
}

/// Identifies one user in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UserKey {
    #[serde(rename = "userId")]
    UserId(i64),
    #[serde(rename = "clientUserIdStr")]
    ClientUserIdStr(String),
    #[serde(rename = "itsIdHash")]
    ItsIdHash(String),
}

impl UserKey {
    /// Pick the key for `user`: the service-assigned id takes precedence over
    /// the client id, which takes precedence over the Apple ID hash.
    pub fn of(user: &VppUser) -> Result<Self, VppError> {
        if let Some(id) = user.user_id.filter(|id| *id != 0) {
            return Ok(Self::UserId(id));
        }
        if let Some(id) = user.client_user_id_str.as_deref().filter(|s| !s.is_empty()) {
            return Ok(Self::ClientUserIdStr(id.to_string()));
        }
        if let Some(hash) = user.its_id_hash.as_deref().filter(|s| !s.is_empty()) {
            return Ok(Self::ItsIdHash(hash.to_string()));
        }
        Err(VppError::InvalidRequest(
            "user has no userId, clientUserIdStr or itsIdHash".into(),
        ))
    }
}

/// Filters for listing users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetUsersOptions {
    include_retired: bool,
}

impl GetUsersOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also return retired users.
    pub fn include_retired(mut self, include: bool) -> Self {
        self.include_retired = include;
        self
    }
}

impl Serialize for GetUsersOptions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("GetUsersOptions", 1)?;
        // The service expects 0/1 rather than a JSON boolean.
        s.serialize_field("includeRetired", &u8::from(self.include_retired))?;
        s.end()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUserRequest<'a> {
    client_user_id_str: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct EditUserRequest<'a> {
    #[serde(flatten)]
    key: &'a UserKey,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: VppUser,
}

#[derive(Debug, Deserialize)]
struct OptionalUserResponse {
    #[serde(default)]
    user: Option<VppUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetUsersResponse {
    #[serde(default)]
    users: Vec<VppUser>,
    #[serde(flatten)]
    tokens: PageTokens,
}

impl PagedResponse for GetUsersResponse {
    fn tokens(&self) -> &PageTokens {
        &self.tokens
    }
}

// -- Client -------------------------------------------------------------------

/// User management verbs.
#[derive(Debug, Clone)]
pub struct UsersClient {
    session: Arc<Session>,
}

impl UsersClient {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Register a new user. The user must carry a `clientUserIdStr`.
    pub async fn register(&self, user: &VppUser) -> Result<VppUser, VppError> {
        let client_user_id_str = user
            .client_user_id_str
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VppError::InvalidRequest("registration requires clientUserIdStr".into()))?;
        let request = RegisterUserRequest {
            client_user_id_str,
            email: user.email.as_deref(),
        };
        let response: UserResponse = self
            .session
            .dispatch(Operation::RegisterUser.key(), &request)
            .await?;
        Ok(response.user)
    }

    /// Fetch one user by client id.
    pub async fn get(&self, client_user_id_str: &str) -> Result<VppUser, VppError> {
        self.get_by(&UserKey::ClientUserIdStr(client_user_id_str.to_string()))
            .await
    }

    /// Fetch one user by any key.
    pub async fn get_by(&self, key: &UserKey) -> Result<VppUser, VppError> {
        let response: UserResponse = self.session.dispatch(Operation::GetUser.key(), key).await?;
        Ok(response.user)
    }

    /// Fetch one page of users and advance `cursor`.
    pub async fn list(
        &self,
        options: &GetUsersOptions,
        cursor: &mut BatchCursor,
    ) -> Result<Page<VppUser>, VppError> {
        let response: GetUsersResponse = self
            .session
            .dispatch_paged(Operation::GetUsers.key(), options, cursor)
            .await?;
        Ok(Page {
            items: response.users,
            total_count: response.tokens.total_count,
        })
    }

    /// Page through users until the cursor is caught up.
    ///
    /// Fails with [`VppError::PagingCycle`] if the service repeats a batch token.
    pub async fn list_all(
        &self,
        options: &GetUsersOptions,
        cursor: &mut BatchCursor,
    ) -> Result<Vec<VppUser>, VppError> {
        let mut users = Vec::new();
        let mut trail = TokenTrail::default();
        trail.follow(Operation::GetUsers.key(), cursor)?;
        loop {
            let page = self.list(options, cursor).await?;
            users.extend(page.items);
            if !cursor.has_next() {
                return Ok(users);
            }
            trail.follow(Operation::GetUsers.key(), cursor)?;
        }
    }

    /// Retire a user: disassociates the Apple ID and releases revocable licenses.
    ///
    /// Returns the updated record when the service includes one.
    pub async fn retire(&self, user: &VppUser) -> Result<Option<VppUser>, VppError> {
        let key = user.key()?;
        let response: OptionalUserResponse =
            self.session.dispatch(Operation::RetireUser.key(), &key).await?;
        Ok(response.user)
    }

    /// Push the e-mail address of `user` to the service.
    pub async fn edit(&self, user: &VppUser) -> Result<Option<VppUser>, VppError> {
        let key = user.key()?;
        let email = user
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| VppError::InvalidRequest("edit requires an email".into()))?;
        let request = EditUserRequest { key: &key, email };
        let response: OptionalUserResponse =
            self.session.dispatch(Operation::EditUser.key(), &request).await?;
        Ok(response.user)
    }
}
