//! The fixed body-region label table and the censorship filter.
//!
//! The detection model predicts 16 named body/face regions with class ids
//! 0-15. The table is a process-wide constant: ids, names, and the
//! bidirectional mapping between them never change at runtime.
//!
//! Filtering preserves the polarity of the original configuration surface:
//! each label carries one boolean toggle, `true` (the default) means the
//! label IS censored, and `false` exempts it from censorship.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::errors::CensorError;
use crate::processors::postprocess::Detection;

/// Number of classes in the label table.
pub const NUM_CLASSES: usize = 16;

/// A detected body/face region class.
///
/// Discriminants are the model's class ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    FemaleFace = 0,
    MaleFace = 1,
    FemaleGenitaliaCovered = 2,
    FemaleGenitaliaExposed = 3,
    ButtocksCovered = 4,
    ButtocksExposed = 5,
    FemaleBreastCovered = 6,
    FemaleBreastExposed = 7,
    MaleBreastExposed = 8,
    ArmpitsExposed = 9,
    BellyExposed = 10,
    MaleGenitaliaExposed = 11,
    AnusExposed = 12,
    FeetCovered = 13,
    FeetExposed = 14,
    Eye = 15,
}

/// All labels, indexed by class id.
pub const ALL_LABELS: [Label; NUM_CLASSES] = [
    Label::FemaleFace,
    Label::MaleFace,
    Label::FemaleGenitaliaCovered,
    Label::FemaleGenitaliaExposed,
    Label::ButtocksCovered,
    Label::ButtocksExposed,
    Label::FemaleBreastCovered,
    Label::FemaleBreastExposed,
    Label::MaleBreastExposed,
    Label::ArmpitsExposed,
    Label::BellyExposed,
    Label::MaleGenitaliaExposed,
    Label::AnusExposed,
    Label::FeetCovered,
    Label::FeetExposed,
    Label::Eye,
];

static NAME_TO_LABEL: Lazy<HashMap<&'static str, Label>> =
    Lazy::new(|| ALL_LABELS.iter().map(|&l| (l.as_str(), l)).collect());

impl Label {
    /// The model's class id for this label.
    pub fn class_id(self) -> usize {
        self as usize
    }

    /// Looks up a label by class id.
    pub fn from_class_id(class_id: usize) -> Option<Label> {
        ALL_LABELS.get(class_id).copied()
    }

    /// The label name as published by the model.
    pub fn as_str(self) -> &'static str {
        match self {
            Label::FemaleFace => "FEMALE_FACE",
            Label::MaleFace => "MALE_FACE",
            Label::FemaleGenitaliaCovered => "FEMALE_GENITALIA_COVERED",
            Label::FemaleGenitaliaExposed => "FEMALE_GENITALIA_EXPOSED",
            Label::ButtocksCovered => "BUTTOCKS_COVERED",
            Label::ButtocksExposed => "BUTTOCKS_EXPOSED",
            Label::FemaleBreastCovered => "FEMALE_BREAST_COVERED",
            Label::FemaleBreastExposed => "FEMALE_BREAST_EXPOSED",
            Label::MaleBreastExposed => "MALE_BREAST_EXPOSED",
            Label::ArmpitsExposed => "ARMPITS_EXPOSED",
            Label::BellyExposed => "BELLY_EXPOSED",
            Label::MaleGenitaliaExposed => "MALE_GENITALIA_EXPOSED",
            Label::AnusExposed => "ANUS_EXPOSED",
            Label::FeetCovered => "FEET_COVERED",
            Label::FeetExposed => "FEET_EXPOSED",
            Label::Eye => "EYE",
        }
    }

    /// Looks up a label by its published name.
    pub fn from_name(name: &str) -> Option<Label> {
        NAME_TO_LABEL.get(name).copied()
    }
}

/// The set of class ids exempt from censorship.
///
/// Built once per pipeline invocation; membership tests are O(1) over a
/// fixed-size array indexed by class id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    exempt: [bool; NUM_CLASSES],
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self::none()
    }
}

impl LabelFilter {
    /// The empty filter: every label is censored.
    pub fn none() -> Self {
        Self {
            exempt: [false; NUM_CLASSES],
        }
    }

    /// Builds a filter from one `censor` toggle per label, indexed by
    /// class id. `censor[id] == true` (the default surface value) keeps
    /// the label censored; `false` exempts it.
    pub fn from_toggles(censor: [bool; NUM_CLASSES]) -> Self {
        let mut exempt = [false; NUM_CLASSES];
        for (id, &censor_label) in censor.iter().enumerate() {
            exempt[id] = !censor_label;
        }
        Self { exempt }
    }

    /// Builds a filter from named `censor` toggles. Labels not mentioned
    /// keep the default (censored).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a name is not in the label table.
    pub fn from_named_toggles<'a>(
        toggles: impl IntoIterator<Item = (&'a str, bool)>,
    ) -> Result<Self, CensorError> {
        let mut censor = [true; NUM_CLASSES];
        for (name, censor_label) in toggles {
            let label = Label::from_name(name).ok_or_else(|| {
                CensorError::config_error(format!("unknown label name: '{name}'"))
            })?;
            censor[label.class_id()] = censor_label;
        }
        Ok(Self::from_toggles(censor))
    }

    /// Marks a label as exempt from censorship.
    pub fn exempt(&mut self, label: Label) {
        self.exempt[label.class_id()] = true;
    }

    /// Whether a class id is exempt from censorship.
    pub fn is_exempt(&self, class_id: usize) -> bool {
        self.exempt.get(class_id).copied().unwrap_or(false)
    }

    /// Keeps exactly the detections whose class is not exempt.
    pub fn retain(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .filter(|d| !self.is_exempt(d.class_id))
            .collect()
    }
}
