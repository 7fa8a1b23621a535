//! The persisted form: school identity, chosen template and last-used paths.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::render::card::SchoolIdentity;
use crate::template::Template;

pub const KEY_FOUNDATION: &str = "school.foundation";
pub const KEY_SCHOOL_NAME: &str = "school.name";
pub const KEY_ADDRESS: &str = "school.address";
pub const KEY_HEADMASTER: &str = "school.headmaster";
pub const KEY_EXAM_NAME: &str = "school.examName";
pub const KEY_SIGN_PLACE: &str = "school.signPlace";
pub const KEY_TEMPLATE: &str = "template";
pub const KEY_ROSTER_PATH: &str = "paths.roster";
pub const KEY_PHOTOS_PATH: &str = "paths.photos";
pub const KEY_LOGO_PATH: &str = "paths.logo";
pub const KEY_SIGNATURE_PATH: &str = "paths.signature";
pub const KEY_OUTPUT_PATH: &str = "paths.output";

const MAX_TEXT_LEN: usize = 300;
/// Paths only get the platform's own limit.
const MAX_PATH_LEN: usize = 4096;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPaths {
    pub roster: String,
    pub photos: String,
    pub logo: String,
    pub signature: String,
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub school: SchoolIdentity,
    pub template: Template,
    pub paths: FormPaths,
}

impl FormState {
    /// Unknown keys are ignored; an unknown stored template id falls back to the default.
    pub fn from_store(map: &BTreeMap<String, String>) -> Self {
        let get = |k: &str| map.get(k).cloned().unwrap_or_default();
        FormState {
            school: SchoolIdentity {
                foundation: get(KEY_FOUNDATION),
                name: get(KEY_SCHOOL_NAME),
                address: get(KEY_ADDRESS),
                headmaster: get(KEY_HEADMASTER),
                exam_name: get(KEY_EXAM_NAME),
                sign_place: get(KEY_SIGN_PLACE),
            },
            template: Template::parse(&get(KEY_TEMPLATE)).unwrap_or_default(),
            paths: FormPaths {
                roster: get(KEY_ROSTER_PATH),
                photos: get(KEY_PHOTOS_PATH),
                logo: get(KEY_LOGO_PATH),
                signature: get(KEY_SIGNATURE_PATH),
                output: get(KEY_OUTPUT_PATH),
            },
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_FOUNDATION, self.school.foundation.clone()),
            (KEY_SCHOOL_NAME, self.school.name.clone()),
            (KEY_ADDRESS, self.school.address.clone()),
            (KEY_HEADMASTER, self.school.headmaster.clone()),
            (KEY_EXAM_NAME, self.school.exam_name.clone()),
            (KEY_SIGN_PLACE, self.school.sign_place.clone()),
            (KEY_TEMPLATE, self.template.id().to_string()),
            (KEY_ROSTER_PATH, self.paths.roster.clone()),
            (KEY_PHOTOS_PATH, self.paths.photos.clone()),
            (KEY_LOGO_PATH, self.paths.logo.clone()),
            (KEY_SIGNATURE_PATH, self.paths.signature.clone()),
            (KEY_OUTPUT_PATH, self.paths.output.clone()),
        ]
    }

    fn slot(&mut self, key: &str) -> Option<&mut String> {
        Some(match key {
            KEY_FOUNDATION => &mut self.school.foundation,
            KEY_SCHOOL_NAME => &mut self.school.name,
            KEY_ADDRESS => &mut self.school.address,
            KEY_HEADMASTER => &mut self.school.headmaster,
            KEY_EXAM_NAME => &mut self.school.exam_name,
            KEY_SIGN_PLACE => &mut self.school.sign_place,
            KEY_ROSTER_PATH => &mut self.paths.roster,
            KEY_PHOTOS_PATH => &mut self.paths.photos,
            KEY_LOGO_PATH => &mut self.paths.logo,
            KEY_SIGNATURE_PATH => &mut self.paths.signature,
            KEY_OUTPUT_PATH => &mut self.paths.output,
            _ => return None,
        })
    }

    /// Apply a flat `{key: string}` patch. All-or-nothing: on error `self` is untouched.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        let mut next = self.clone();
        for (k, v) in patch {
            let Some(s) = v.as_str() else {
                return Err(format!("{} must be a string", k));
            };
            if k == KEY_TEMPLATE {
                next.template =
                    Template::parse(s).ok_or_else(|| format!("unknown template: {}", s))?;
                continue;
            }
            let limit = if k.starts_with("paths.") {
                MAX_PATH_LEN
            } else {
                MAX_TEXT_LEN
            };
            if s.chars().count() > limit {
                return Err(format!("{} is too long", k));
            }
            let Some(slot) = next.slot(k) else {
                return Err(format!("unknown setting: {}", k));
            };
            *slot = s.to_string();
        }
        *self = next;
        Ok(())
    }
}
