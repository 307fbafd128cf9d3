// src/models/catalog.rs

use serde::{Deserialize, Serialize};

const PRIMARY_SUBJECTS: &[&str] = &[
    "Marathi",
    "English",
    "Mathematics",
    "Environmental Studies (EVS)",
];

const MIDDLE_SUBJECTS: &[&str] = &[
    "English",
    "Marathi",
    "Mathematics",
    "History",
    "Civics",
    "Geography",
    "Science",
];

const SECONDARY_SUBJECTS: &[&str] = &[
    "Mathematics",
    "Science",
    "English",
    "Social Studies",
    "Hindi",
    "Marathi",
    "Computer",
    "EVS",
    "Sanskrit",
];

/// Subjects offered for a class level.
/// Classes 1-5 and 6-7 have fixed lists; anything else gets the full catalogue.
pub fn subjects_for_class(class_level: &str) -> &'static [&'static str] {
    match class_level.trim().parse::<u32>() {
        Ok(1..=5) => PRIMARY_SUBJECTS,
        Ok(6..=7) => MIDDLE_SUBJECTS,
        _ => SECONDARY_SUBJECTS,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectParams {
    #[serde(alias = "stdClass")]
    pub class_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectList {
    pub class_level: String,
    pub subjects: Vec<String>,
}
