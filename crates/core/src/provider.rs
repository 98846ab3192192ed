//! External collaborator seams.
//!
//! Curriculum hierarchy is authored outside this core; the engine only
//! ever sees the flat set of leaf chapter ids that defines the progress
//! denominator.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{ChapterId, CourseId};

/// Supplies the leaf chapters of a course.
#[async_trait]
pub trait CourseStructureProvider: Send + Sync {
    async fn leaf_chapter_ids(&self, course_id: &CourseId) -> Result<BTreeSet<ChapterId>, CoreError>;
}
