use serde::Deserialize;

/// Skills arrive either as `"rust, go"` or as `["rust", "go"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SkillsInput {
    List(Vec<String>),
    Csv(String),
}

impl SkillsInput {
    pub fn into_skills(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            SkillsInput::List(items) => items,
            SkillsInput::Csv(s) => s.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileRequest {
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub status: Option<String>,
    pub githubusername: Option<String>,
    pub skills: Option<SkillsInput>,
    pub youtube: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExperienceRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub current: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EducationRequest {
    pub school: Option<String>,
    pub degree: Option<String>,
    pub fieldofstudy: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub current: Option<bool>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_skills_are_split_and_trimmed() {
        let skills = SkillsInput::Csv(" rust,  go ,,python ".into()).into_skills();
        assert_eq!(skills, vec!["rust", "go", "python"]);
    }

    #[test]
    fn skills_accept_array_or_string() {
        let req: ProfileRequest =
            serde_json::from_str(r#"{"status":"dev","skills":["rust"," sql "]}"#).unwrap();
        assert_eq!(req.skills.unwrap().into_skills(), vec!["rust", "sql"]);

        let req: ProfileRequest = serde_json::from_str(r#"{"skills":"a,b"}"#).unwrap();
        assert_eq!(req.skills.unwrap().into_skills(), vec!["a", "b"]);
    }

    #[test]
    fn missing_fields_default_to_none() {
        let req: ExperienceRequest = serde_json::from_str("{}").unwrap();
        assert!(req.title.is_none());
        assert!(req.current.is_none());
    }
}
