//! Skill Advisor - skill recommendations that learn from feedback.

pub mod config;
pub mod context;
pub mod display;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod ratings;
pub mod recommend;
pub mod store;

pub use engine::SkillAdvisor;
pub use error::{Result, SkillError};
