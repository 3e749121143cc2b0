use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::ids::ModuleId;

/// Subject area of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleCategory {
    ReadingWriting,
    Math,
    Other(String),
}

/// Code shown for modules without a known or declared category.
pub const OTHER_CATEGORY: &str = "Other";

impl ModuleCategory {
    /// Parse the short category code used by module metadata (`"RW"`, `"Math"`).
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "RW" => ModuleCategory::ReadingWriting,
            "Math" | "MT" => ModuleCategory::Math,
            "" => ModuleCategory::Other(OTHER_CATEGORY.to_string()),
            other => ModuleCategory::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            ModuleCategory::ReadingWriting => "RW",
            ModuleCategory::Math => "Math",
            ModuleCategory::Other(code) => code,
        }
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Static description of a module: how it is named and introduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    id: ModuleId,
    display_name: String,
    category: ModuleCategory,
    directions: String,
    spr_instructions: Option<String>,
    time_limit_secs: Option<u32>,
}

impl ModuleDescriptor {
    #[must_use]
    pub fn new(
        id: ModuleId,
        display_name: impl Into<String>,
        category: ModuleCategory,
        directions: impl Into<String>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            category,
            directions: directions.into(),
            spr_instructions: None,
            time_limit_secs: None,
        }
    }

    /// Descriptor for an identifier the catalog does not know.
    ///
    /// The display name is the identifier with `_` and `-` shown as spaces.
    #[must_use]
    pub fn synthesized(id: &ModuleId) -> Self {
        let display_name = id.as_str().replace(['_', '-'], " ");
        Self::new(
            id.clone(),
            display_name,
            ModuleCategory::Other(OTHER_CATEGORY.to_string()),
            "",
        )
    }

    #[must_use]
    pub fn with_spr_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.spr_instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn with_time_limit_secs(mut self, secs: u32) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Name used for the module in submission records.
    #[must_use]
    pub fn quiz_name(&self) -> &str {
        self.id.as_str()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn category(&self) -> &ModuleCategory {
        &self.category
    }

    #[must_use]
    pub fn directions(&self) -> &str {
        &self.directions
    }

    #[must_use]
    pub fn spr_instructions(&self) -> Option<&str> {
        self.spr_instructions.as_deref()
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }
}

const RW_DIRECTIONS: &str = "The questions in this section address a number of important reading \
    and writing skills. Each question includes one or more passages, which may include a table or \
    graph. Read each passage and question carefully, and then choose the best answer to the \
    question based on the passage(s). All questions in this section are multiple-choice with \
    four answer choices. Each question has a single best answer.";

const MATH_DIRECTIONS: &str = "The questions in this section address a number of important math \
    skills. Use of a calculator is permitted for all questions. Unless otherwise indicated, all \
    variables and expressions represent real numbers, figures are drawn to scale, and all figures \
    lie in a plane.";

const SPR_INSTRUCTIONS: &str = "For student-produced response questions: if you find more than \
    one correct answer, enter only one answer. You can enter up to 5 characters for a positive \
    answer and up to 6 characters (including the negative sign) for a negative answer. If your \
    answer is a fraction that doesn't fit, enter the decimal equivalent. Don't enter symbols such \
    as a percent sign, comma, or dollar sign.";

/// Immutable lookup of module identifier to descriptor.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: HashMap<ModuleId, ModuleDescriptor>,
}

impl ModuleCatalog {
    #[must_use]
    pub fn new(descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> Self {
        let modules = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.id().clone(), descriptor))
            .collect();
        Self { modules }
    }

    /// Catalog of the bundled diagnostic practice test.
    #[must_use]
    pub fn builtin() -> Self {
        let rw = |id: &str, name: &str| {
            ModuleDescriptor::new(
                ModuleId::new(id),
                name,
                ModuleCategory::ReadingWriting,
                RW_DIRECTIONS,
            )
            .with_time_limit_secs(32 * 60)
        };
        let math = |id: &str, name: &str| {
            ModuleDescriptor::new(ModuleId::new(id), name, ModuleCategory::Math, MATH_DIRECTIONS)
                .with_spr_instructions(SPR_INSTRUCTIONS)
                .with_time_limit_secs(35 * 60)
        };

        Self::new([
            rw("DT-T0-RW-M1", "Reading and Writing: Module 1"),
            rw("DT-T0-RW-M2", "Reading and Writing: Module 2"),
            math("DT-T0-MT-M1", "Math: Module 1"),
            math("DT-T0-MT-M2", "Math: Module 2"),
        ])
    }

    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<&ModuleDescriptor> {
        self.modules.get(id)
    }

    /// Known descriptor, or a synthesized one for unknown identifiers.
    #[must_use]
    pub fn resolve(&self, id: &ModuleId) -> ModuleDescriptor {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| ModuleDescriptor::synthesized(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_resolves_known_modules() {
        let catalog = ModuleCatalog::builtin();
        let math = catalog.get(&ModuleId::new("DT-T0-MT-M1")).unwrap();
        assert_eq!(math.category(), &ModuleCategory::Math);
        assert!(math.spr_instructions().is_some());
        assert_eq!(math.quiz_name(), "DT-T0-MT-M1");

        let rw = catalog.get(&ModuleId::new("DT-T0-RW-M2")).unwrap();
        assert_eq!(rw.category(), &ModuleCategory::ReadingWriting);
        assert!(rw.spr_instructions().is_none());
    }

    #[test]
    fn unknown_module_gets_readable_synthesized_name() {
        let catalog = ModuleCatalog::builtin();
        let descriptor = catalog.resolve(&ModuleId::new("Algebra_Quiz-3"));
        assert_eq!(descriptor.display_name(), "Algebra Quiz 3");
        assert_eq!(descriptor.quiz_name(), "Algebra_Quiz-3");
        assert_eq!(descriptor.category().to_string(), "Other");
        assert!(descriptor.time_limit_secs().is_none());
    }

    #[test]
    fn category_codes_round_trip() {
        assert_eq!(ModuleCategory::from_code("RW"), ModuleCategory::ReadingWriting);
        assert_eq!(ModuleCategory::from_code("Math"), ModuleCategory::Math);
        assert_eq!(ModuleCategory::from_code("Sci").code(), "Sci");
        assert_eq!(ModuleCategory::from_code("  ").code(), "Other");
    }
}
