//! Utilities module - small text helpers shared by the codec and the session store

pub mod text_utils;

pub use text_utils::TextUtils;
