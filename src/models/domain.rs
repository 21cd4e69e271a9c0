use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sex of a directory user, using the directory's numeric codes
/// (0 = unknown, 1 = female, 2 = male).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[default]
    Unknown,
    Female,
    Male,
}

impl Sex {
    pub fn code(self) -> u8 {
        match self {
            Sex::Unknown => 0,
            Sex::Female => 1,
            Sex::Male => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Sex::Unknown),
            1 => Some(Sex::Female),
            2 => Some(Sex::Male),
            _ => None,
        }
    }

    /// The opposite sex; `Unknown` stays `Unknown` (the directory treats it as "any").
    pub fn opposite(self) -> Self {
        match self {
            Sex::Female => Sex::Male,
            Sex::Male => Sex::Female,
            Sex::Unknown => Sex::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sex::Unknown => "not set",
            Sex::Female => "female",
            Sex::Male => "male",
        }
    }
}

/// Which sex the viewer wants to be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredSex {
    #[default]
    Any,
    Female,
    Male,
}

impl PreferredSex {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PreferredSex::Any),
            1 => Some(PreferredSex::Female),
            2 => Some(PreferredSex::Male),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PreferredSex::Any => "any",
            PreferredSex::Female => "female",
            PreferredSex::Male => "male",
        }
    }
}

/// Fully populated search criteria of a viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserCriteria {
    #[validate(range(min = 18, max = 100))]
    pub age: u8,
    #[validate(length(min = 2, max = 100))]
    pub city: String,
    pub sex: Sex,
    #[serde(rename = "preferredSex", default)]
    pub preferred_sex: PreferredSex,
}

impl UserCriteria {
    /// Sex filter passed to the directory.
    ///
    /// An explicit preference wins; otherwise the opposite of the viewer's own sex.
    pub fn search_sex(&self) -> Sex {
        match self.preferred_sex {
            PreferredSex::Female => Sex::Female,
            PreferredSex::Male => Sex::Male,
            PreferredSex::Any => self.sex.opposite(),
        }
    }
}

/// Criteria field that must be filled before a search may start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriteriaField {
    Age,
    City,
    Sex,
}

impl CriteriaField {
    pub fn label(self) -> &'static str {
        match self {
            CriteriaField::Age => "age",
            CriteriaField::City => "city",
            CriteriaField::Sex => "sex",
        }
    }
}

/// Possibly incomplete criteria as accumulated through the settings dialogue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaDraft {
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub sex: Sex,
    #[serde(rename = "preferredSex", default)]
    pub preferred_sex: PreferredSex,
}

impl CriteriaDraft {
    /// Required fields still missing, in prompting order
    pub fn missing_fields(&self) -> Vec<CriteriaField> {
        let mut missing = Vec::new();
        if self.age.is_none() {
            missing.push(CriteriaField::Age);
        }
        if self.city.as_deref().map_or(true, |c| c.trim().is_empty()) {
            missing.push(CriteriaField::City);
        }
        if self.sex == Sex::Unknown {
            missing.push(CriteriaField::Sex);
        }
        missing
    }

    pub fn complete(&self) -> Option<UserCriteria> {
        match (self.age, self.city.as_ref()) {
            (Some(age), Some(city)) if self.sex != Sex::Unknown && !city.trim().is_empty() => {
                Some(UserCriteria {
                    age,
                    city: city.clone(),
                    sex: self.sex,
                    preferred_sex: self.preferred_sex,
                })
            }
            _ => None,
        }
    }
}

/// A photo of a candidate: directory attachment reference and its like count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    #[serde(rename = "attachmentRef")]
    pub attachment_ref: String,
    #[serde(rename = "likeCount")]
    pub like_count: i64,
}

impl PhotoRef {
    pub fn new(attachment_ref: impl Into<String>, like_count: i64) -> Self {
        Self {
            attachment_ref: attachment_ref.into(),
            like_count,
        }
    }
}

/// A directory profile accepted as a match proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "externalId")]
    pub external_id: i64,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "profileLink")]
    pub profile_link: String,
    pub photos: Vec<PhotoRef>,
    #[serde(rename = "sourceCriteria")]
    pub source_criteria: UserCriteria,
}

impl Candidate {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Comma separated attachment list as the messaging platform expects it
    pub fn attachment(&self) -> Option<String> {
        if self.photos.is_empty() {
            return None;
        }
        Some(
            self.photos
                .iter()
                .map(|p| p.attachment_ref.as_str())
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// Judgement a viewer passed on a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingKind {
    Liked,
    Disliked,
    Blacklisted,
}

/// Kind of exclusion record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionKind {
    Viewed,
    Liked,
    Disliked,
    Blacklisted,
}

impl From<RatingKind> for ExclusionKind {
    fn from(value: RatingKind) -> Self {
        match value {
            RatingKind::Liked => ExclusionKind::Liked,
            RatingKind::Disliked => ExclusionKind::Disliked,
            RatingKind::Blacklisted => ExclusionKind::Blacklisted,
        }
    }
}

/// One row of a viewer's exclusion history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    #[serde(rename = "viewerId")]
    pub viewer_id: i64,
    #[serde(rename = "candidateId")]
    pub candidate_id: i64,
    pub kind: ExclusionKind,
    pub timestamp: DateTime<Utc>,
}

/// Profile as returned by a directory search page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProfile {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub can_access_closed: bool,
}

/// What the directory knows about the requesting user themselves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSnapshot {
    pub age: Option<u8>,
    pub city: Option<String>,
    pub sex: Sex,
}

/// Aggregate counters over a viewer's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    #[serde(rename = "viewerId")]
    pub viewer_id: i64,
    pub viewed: usize,
    pub liked: usize,
    pub disliked: usize,
    pub blacklisted: usize,
    pub favorites: usize,
    #[serde(rename = "successRate")]
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(sex: Sex, preferred_sex: PreferredSex) -> UserCriteria {
        UserCriteria {
            age: 25,
            city: "Moscow".to_string(),
            sex,
            preferred_sex,
        }
    }

    #[test]
    fn test_search_sex_inverts_without_preference() {
        assert_eq!(criteria(Sex::Male, PreferredSex::Any).search_sex(), Sex::Female);
        assert_eq!(criteria(Sex::Female, PreferredSex::Any).search_sex(), Sex::Male);
    }

    #[test]
    fn test_search_sex_uses_explicit_preference() {
        assert_eq!(criteria(Sex::Male, PreferredSex::Male).search_sex(), Sex::Male);
        assert_eq!(criteria(Sex::Female, PreferredSex::Female).search_sex(), Sex::Female);
    }

    #[test]
    fn test_draft_missing_fields_in_order() {
        let draft = CriteriaDraft::default();
        assert_eq!(
            draft.missing_fields(),
            vec![CriteriaField::Age, CriteriaField::City, CriteriaField::Sex]
        );
        assert!(draft.complete().is_none());

        let draft = CriteriaDraft {
            age: Some(30),
            city: Some("Kazan".to_string()),
            sex: Sex::Female,
            preferred_sex: PreferredSex::Any,
        };
        assert!(draft.missing_fields().is_empty());
        assert_eq!(draft.complete().map(|c| c.age), Some(30));
    }

    #[test]
    fn test_blank_city_counts_as_missing() {
        let draft = CriteriaDraft {
            age: Some(30),
            city: Some("  ".to_string()),
            sex: Sex::Male,
            preferred_sex: PreferredSex::Any,
        };
        assert_eq!(draft.missing_fields(), vec![CriteriaField::City]);
    }

    #[test]
    fn test_candidate_attachment_joins_refs() {
        let candidate = Candidate {
            external_id: 1,
            first_name: "Anna".to_string(),
            last_name: "K".to_string(),
            profile_link: "https://vk.com/id1".to_string(),
            photos: vec![PhotoRef::new("photo1_10", 5), PhotoRef::new("photo1_11", 2)],
            source_criteria: criteria(Sex::Male, PreferredSex::Any),
        };
        assert_eq!(candidate.attachment().as_deref(), Some("photo1_10,photo1_11"));
        assert_eq!(candidate.full_name(), "Anna K");
    }
}
