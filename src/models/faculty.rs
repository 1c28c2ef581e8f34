//! Faculty record models.

use serde::{Deserialize, Serialize};

/// A parsed faculty entry before it has a place in a merged dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacultyEntry {
    pub department: String,
    pub name: String,
    pub title: String,
    pub image: Option<String>,
    pub email: Option<String>,
    pub number: Option<String>,
    pub areas_of_interest: Option<String>,
}

impl FacultyEntry {
    /// Fill contact fields from a profile page.
    pub fn with_profile(mut self, details: ProfileDetails) -> Self {
        self.email = details.email;
        self.number = details.number;
        self.areas_of_interest = details.areas_of_interest;
        self
    }

    /// Bind this entry to its position in the merged sequence.
    pub fn into_record(self, id: usize) -> FacultyRecord {
        FacultyRecord {
            id,
            department: self.department,
            name: self.name,
            title: self.title,
            image: self.image,
            email: self.email,
            number: self.number,
            areas_of_interest: self.areas_of_interest,
        }
    }
}

/// One faculty member's public profile inside a snapshot.
///
/// `id` is the record's 0-based position in the department-ordered merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacultyRecord {
    pub id: usize,
    pub department: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub areas_of_interest: Option<String>,
}

/// Contact details lifted from a faculty profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDetails {
    pub email: Option<String>,
    pub number: Option<String>,
    pub areas_of_interest: Option<String>,
}
