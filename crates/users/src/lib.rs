//! `custodia-users`: accounts, teacher profiles and who may change them.
//!
//! Users are the holders of every custody record. Password hashing and token
//! issuance live in `custodia-auth`; this crate only decides what a valid
//! account looks like and which principal may touch it.

pub mod account;
pub mod user;

pub use account::{
    ChangePassword, RegisterUser, UserPatch, apply_patch, check_registration, ensure_can_delete,
    ensure_manager, ensure_self_or_manager, new_user,
};
pub use user::{Level, Shift, TeacherProfile, User, validate_password};
