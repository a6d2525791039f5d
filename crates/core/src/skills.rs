//! Skill name resolution.

use crate::api::{ApiError, RobotApi};
use misty_types::Skill;

/// Finds the unique id of the first skill named `name`.
///
/// A linear scan; no match is `None`, not an error.
pub fn resolve_skill_id<'a>(skills: &'a [Skill], name: &str) -> Option<&'a str> {
    skills
        .iter()
        .find(|skill| skill.name == name)
        .map(|skill| skill.unique_id.as_str())
}

/// Fetches the installed skills and resolves `name` against them.
pub async fn find_skill_id<A>(api: &A, name: &str) -> Result<Option<String>, ApiError>
where
    A: RobotApi + ?Sized,
{
    let skills = api.skills(false).await?;
    Ok(resolve_skill_id(&skills, name).map(str::to_string))
}
