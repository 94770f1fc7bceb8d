//! Handles, descriptor macros and user data shared by the body, fixture and joint sets.

pub use self::handle_set::{Handle, HandleSet};
pub use self::user_data::UserData;

#[macro_use]
mod desc;
#[macro_use]
mod handle_set;
mod user_data;
