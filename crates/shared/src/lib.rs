pub mod classify;
pub mod icon;
pub mod models;
pub mod popup;
