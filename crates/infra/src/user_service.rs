//! Account service: registration, login and profile administration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use custodia_auth::{Hs256Jwt, Principal, Role, hash_password, verify_password};
use custodia_core::{DomainError, UserId};
use custodia_users::{
    ChangePassword, RegisterUser, User, UserPatch, apply_patch, check_registration,
    ensure_can_delete, ensure_manager, ensure_self_or_manager, new_user, validate_password,
};

use crate::custody_service::CustodyLookup;
use crate::error::{ServiceError, ServiceResult};
use crate::store::UserStore;

/// Successful login.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until expiry.
    pub expires_in: i64,
    pub user: User,
}

pub struct UserService<S> {
    store: S,
    jwt: Hs256Jwt,
}

impl<S> core::fmt::Debug for UserService<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserService").field("jwt", &self.jwt).finish_non_exhaustive()
    }
}

impl<S: UserStore> UserService<S> {
    pub fn new(store: S, jwt: Hs256Jwt) -> Self {
        Self { store, jwt }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load(&self, id: UserId) -> ServiceResult<User> {
        self.store
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("user {id}")).into())
    }

    #[instrument(skip(self, cmd), fields(username = %cmd.username.trim()), err)]
    pub fn register(&self, cmd: RegisterUser, at: DateTime<Utc>) -> ServiceResult<User> {
        check_registration(&cmd)?;
        let hash = hash_password(&cmd.password)?;
        let user = new_user(cmd, UserId::new(), hash, at)?;
        self.store.insert(&user).map_err(|err| {
            warn!(username = %user.username, error = %err, "registration rejected");
            ServiceError::from(err)
        })?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Verify credentials and issue an access token.
    #[instrument(skip(self, password), err)]
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<IssuedToken> {
        let Some(user) = self.store.find_by_username(username.trim())? else {
            warn!("login for unknown username");
            return Err(ServiceError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let access_token = self
            .jwt
            .issue(user.id, &user.username, vec![user.role.clone()], now)?;
        info!(user_id = %user.id, "access token issued");
        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_in: self.jwt.ttl().num_seconds(),
            user,
        })
    }

    /// Users change their own password only.
    #[instrument(skip(self, actor, cmd), fields(actor = %actor.principal_id), err)]
    pub fn change_password(
        &self,
        actor: &Principal,
        cmd: ChangePassword,
        at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut user = self.load(actor.principal_id)?;
        if !verify_password(&cmd.current_password, &user.password_hash)? {
            warn!(user_id = %user.id, "password change with wrong current password");
            return Err(DomainError::validation("current password is incorrect").into());
        }
        validate_password(&cmd.new_password)?;

        user.password_hash = hash_password(&cmd.new_password)?;
        user.updated_at = at;
        self.store.update(&user)?;
        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    #[instrument(skip(self, actor, patch), fields(actor = %actor.principal_id), err)]
    pub fn update(
        &self,
        actor: &Principal,
        id: UserId,
        patch: UserPatch,
        at: DateTime<Utc>,
    ) -> ServiceResult<User> {
        let mut user = self.load(id)?;
        apply_patch(&mut user, patch, actor, at).inspect_err(|err| {
            warn!(user_id = %id, error = %err, "profile update rejected");
        })?;
        self.store.update(&user)?;
        info!(user_id = %id, "user updated");
        Ok(user)
    }

    /// Delete an account. Refused while the user still holds anything, so
    /// no custody record is left pointing at a missing holder.
    #[instrument(skip(self, actor, custody), fields(actor = %actor.principal_id), err)]
    pub fn delete(
        &self,
        actor: &Principal,
        id: UserId,
        custody: &[&dyn CustodyLookup],
    ) -> ServiceResult<()> {
        ensure_can_delete(actor, id)?;
        let user = self.load(id)?;
        for lookup in custody {
            let held = lookup.active_records_held_by(id)?;
            if held > 0 {
                warn!(user_id = %id, kind = lookup.kind_name(), held, "user still holds resources");
                return Err(DomainError::conflict(format!(
                    "user '{}' still holds {held} active {} record(s); return them first",
                    user.username,
                    lookup.kind_name()
                ))
                .into());
            }
        }
        if !self.store.delete(id)? {
            return Err(DomainError::not_found(format!("user {id}")).into());
        }
        info!(user_id = %id, username = %user.username, "user deleted");
        Ok(())
    }

    pub fn get(&self, actor: &Principal, id: UserId) -> ServiceResult<User> {
        ensure_self_or_manager(actor, id, "view this user")?;
        self.load(id)
    }

    pub fn list(&self, actor: &Principal, role: Option<&Role>) -> ServiceResult<Vec<User>> {
        ensure_manager(actor, "list users")?;
        Ok(self.store.list(role)?)
    }

    pub fn teachers(&self) -> ServiceResult<Vec<User>> {
        let mut users = self.store.list(None)?;
        users.retain(User::is_teacher);
        Ok(users)
    }

    /// Create the initial administrator unless the username is taken.
    /// Returns whether an account was created.
    #[instrument(skip(self, password), err)]
    pub fn bootstrap_admin(
        &self,
        username: &str,
        password: &str,
        at: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        if self.store.find_by_username(username.trim())?.is_some() {
            return Ok(false);
        }
        let cmd = RegisterUser {
            username: username.to_string(),
            password: password.to_string(),
            email: None,
            first_name: "System".to_string(),
            last_name: "Administrator".to_string(),
            dni: None,
            phone: None,
            is_teacher: false,
            grade: None,
            section: None,
            shift: None,
            level: None,
        };
        check_registration(&cmd)?;
        let hash = hash_password(&cmd.password)?;
        let mut user = new_user(cmd, UserId::new(), hash, at)?;
        user.role = Role::ADMIN;
        self.store.insert(&user)?;
        info!(user_id = %user.id, username = %user.username, "administrator account created");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryUserStore;
    use chrono::Duration;
    use custodia_auth::JwtValidator;

    fn service() -> UserService<InMemoryUserStore> {
        UserService::new(
            InMemoryUserStore::default(),
            Hs256Jwt::new(b"test-secret", Duration::minutes(10)),
        )
    }

    fn registration(username: &str, dni: &str) -> RegisterUser {
        RegisterUser {
            username: username.to_string(),
            password: "clave-segura".to_string(),
            email: None,
            first_name: "Rosa".to_string(),
            last_name: "Huamán".to_string(),
            dni: Some(dni.to_string()),
            phone: None,
            is_teacher: false,
            grade: None,
            section: None,
            shift: None,
            level: None,
        }
    }

    struct Holds(usize);

    impl CustodyLookup for Holds {
        fn kind_name(&self) -> &'static str {
            "asset"
        }

        fn active_records_held_by(&self, _: UserId) -> ServiceResult<usize> {
            Ok(self.0)
        }
    }

    #[test]
    fn register_then_authenticate() {
        let svc = service();
        let now = Utc::now();
        let user = svc.register(registration("rhuaman", "11112222"), now).unwrap();
        assert_ne!(user.password_hash, "clave-segura");

        let token = svc.authenticate(" rhuaman ", "clave-segura", now).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 600);
        let claims = svc.jwt.validate(&token.access_token, now).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.roles, vec![Role::GENERAL]);

        assert!(matches!(
            svc.authenticate("rhuaman", "otra", now),
            Err(ServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.authenticate("nadie", "clave-segura", now),
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[test]
    fn duplicate_dni_is_rejected() {
        let svc = service();
        svc.register(registration("a", "11112222"), Utc::now()).unwrap();
        let err = svc.register(registration("b", "11112222"), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Duplicate(_))));
    }

    #[test]
    fn change_password_requires_current_one() {
        let svc = service();
        let now = Utc::now();
        let user = svc.register(registration("rosa", "11112222"), now).unwrap();
        let me = Principal::from_roles(user.id, vec![Role::GENERAL]);

        let wrong = ChangePassword {
            current_password: "nope".to_string(),
            new_password: "nueva".to_string(),
        };
        assert!(svc.change_password(&me, wrong, now).is_err());

        let right = ChangePassword {
            current_password: "clave-segura".to_string(),
            new_password: "nueva".to_string(),
        };
        svc.change_password(&me, right, now).unwrap();
        assert!(svc.authenticate("rosa", "nueva", now).is_ok());
    }

    #[test]
    fn delete_is_refused_while_holding_custody() {
        let svc = service();
        let now = Utc::now();
        let user = svc.register(registration("rosa", "11112222"), now).unwrap();
        let admin = Principal::from_roles(UserId::new(), vec![Role::ADMIN]);

        let err = svc.delete(&admin, user.id, &[&Holds(0), &Holds(2)]).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        svc.delete(&admin, user.id, &[&Holds(0)]).unwrap();
        assert!(matches!(
            svc.delete(&admin, user.id, &[]),
            Err(ServiceError::Domain(DomainError::NotFound(_)))
        ));
    }

    #[test]
    fn bootstrap_admin_runs_once() {
        let svc = service();
        let now = Utc::now();
        assert!(svc.bootstrap_admin("admin", "admin-pass", now).unwrap());
        assert!(!svc.bootstrap_admin("admin", "admin-pass", now).unwrap());

        let token = svc.authenticate("admin", "admin-pass", now).unwrap();
        assert!(token.user.is_admin());

        let admin = Principal::from_roles(token.user.id, vec![Role::ADMIN]);
        assert_eq!(svc.list(&admin, Some(&Role::ADMIN)).unwrap().len(), 1);
        assert!(svc.teachers().unwrap().is_empty());
    }
}
