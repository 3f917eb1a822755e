pub mod classify;
pub mod csrf;
pub mod guard;
pub mod protection;
pub mod rejection;
pub mod template;
