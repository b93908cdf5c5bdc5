//! Cross-cutting helpers.

pub mod ids;
pub mod json_file;
pub mod strings;
