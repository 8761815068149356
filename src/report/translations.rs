//! Report strings for the supported UI languages.
//!
//! Unknown language codes fall back to English.

use crate::output::{Allergen, Nutrient};

/// Every fixed string a report needs, in one language.
#[derive(Debug, Clone, Copy)]
pub struct Strings {
    pub code: &'static str,
    pub title: &'static str,
    pub allergens: &'static str,
    pub nutrition: &'static str,
    pub col_allergen: &'static str,
    pub col_present: &'static str,
    pub col_nutrient: &'static str,
    pub col_value: &'static str,
    pub no_allergens: &'static str,
    pub no_nutrition: &'static str,
    pub not_available: &'static str,
    allergen_labels: [&'static str; 10],
    nutrient_labels: [&'static str; 6],
}

/// Language codes with a full translation.
pub const SUPPORTED: [&str; 4] = ["en", "fr", "de", "hu"];

// Label arrays follow `Allergen::ALL` and `Nutrient::ALL` order.

const EN: Strings = Strings {
    code: "en",
    title: "Food Product Analysis Report",
    allergens: "Allergen Information",
    nutrition: "Nutritional Values (per 100g)",
    col_allergen: "Allergen",
    col_present: "Present",
    col_nutrient: "Nutrient",
    col_value: "Value",
    no_allergens: "No allergens detected.",
    no_nutrition: "No nutrition data available.",
    not_available: "Not available",
    allergen_labels: [
        "Gluten", "Egg", "Crustaceans", "Fish", "Peanut", "Soy", "Milk", "Tree Nuts", "Celery",
        "Mustard",
    ],
    nutrient_labels: ["Energy", "Fat", "Carbohydrate", "Sugar", "Protein", "Sodium"],
};

const FR: Strings = Strings {
    code: "fr",
    title: "Rapport d'analyse du produit alimentaire",
    allergens: "Informations sur les allergènes",
    nutrition: "Valeurs nutritionnelles (pour 100g)",
    col_allergen: "Allergène",
    col_present: "Présent",
    col_nutrient: "Nutriment",
    col_value: "Valeur",
    no_allergens: "Aucun allergène détecté.",
    no_nutrition: "Aucune donnée nutritionnelle disponible.",
    not_available: "Non disponible",
    allergen_labels: [
        "Gluten", "Œuf", "Crustacés", "Poisson", "Arachide", "Soja", "Lait", "Fruits à coque",
        "Céleri", "Moutarde",
    ],
    nutrient_labels: ["Énergie", "Matières grasses", "Glucides", "Sucres", "Protéines", "Sodium"],
};

const DE: Strings = Strings {
    code: "de",
    title: "Lebensmittelanalysebericht",
    allergens: "Allergeninformationen",
    nutrition: "Nährwerte (pro 100g)",
    col_allergen: "Allergen",
    col_present: "Vorhanden",
    col_nutrient: "Nährstoff",
    col_value: "Wert",
    no_allergens: "Keine Allergene festgestellt.",
    no_nutrition: "Keine Nährwertdaten verfügbar.",
    not_available: "Nicht verfügbar",
    allergen_labels: [
        "Gluten", "Ei", "Krebstiere", "Fisch", "Erdnuss", "Soja", "Milch", "Schalenfrüchte",
        "Sellerie", "Senf",
    ],
    nutrient_labels: ["Energie", "Fett", "Kohlenhydrate", "Zucker", "Eiweiß", "Natrium"],
};

const HU: Strings = Strings {
    code: "hu",
    title: "Élelmiszertermék elemzési jelentés",
    allergens: "Allergén információk",
    nutrition: "Tápértékek (100 g-ra)",
    col_allergen: "Allergén",
    col_present: "Jelen van",
    col_nutrient: "Tápanyag",
    col_value: "Érték",
    no_allergens: "Nem találtunk allergéneket.",
    no_nutrition: "Nincsenek elérhető tápérték adatok.",
    not_available: "Nem elérhető",
    allergen_labels: [
        "Glutén", "Tojás", "Rákfélék", "Hal", "Földimogyoró", "Szója", "Tej", "Diófélék", "Zeller",
        "Mustár",
    ],
    nutrient_labels: ["Energia", "Zsír", "Szénhidrát", "Cukor", "Fehérje", "Nátrium"],
};

/// Strings for `lang`, falling back to English.
pub fn strings(lang: &str) -> &'static Strings {
    match lang.trim().to_ascii_lowercase().as_str() {
        "fr" => &FR,
        "de" => &DE,
        "hu" => &HU,
        _ => &EN,
    }
}

impl Strings {
    pub fn allergen_label(&self, allergen: Allergen) -> &'static str {
        let idx = Allergen::ALL.iter().position(|a| *a == allergen).unwrap_or(0);
        self.allergen_labels[idx]
    }

    pub fn nutrient_label(&self, nutrient: Nutrient) -> &'static str {
        let idx = Nutrient::ALL.iter().position(|n| *n == nutrient).unwrap_or(0);
        self.nutrient_labels[idx]
    }

    /// Label for a free-form allergen key; unknown keys are shown as-is.
    pub fn allergen_label_for_key<'a>(&self, key: &'a str) -> &'a str {
        match Allergen::from_key(key) {
            Some(a) => self.allergen_label(a),
            None => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_english() {
        assert_eq!(strings("pl").code, "en");
        assert_eq!(strings("").code, "en");
        assert_eq!(strings("DE").code, "de");
    }

    #[test]
    fn labels_line_up_with_canonical_order() {
        let de = strings("de");
        assert_eq!(de.allergen_label(Allergen::TreeNuts), "Schalenfrüchte");
        assert_eq!(de.allergen_label(Allergen::Mustard), "Senf");
        assert_eq!(de.nutrient_label(Nutrient::Protein), "Eiweiß");
        let hu = strings("hu");
        assert_eq!(hu.allergen_label(Allergen::Peanut), "Földimogyoró");
        assert_eq!(hu.nutrient_label(Nutrient::Sodium), "Nátrium");
        assert_eq!(strings("fr").allergen_label(Allergen::Egg), "Œuf");
    }

    #[test]
    fn free_form_keys() {
        let en = strings("en");
        assert_eq!(en.allergen_label_for_key("tree_nuts"), "Tree Nuts");
        assert_eq!(en.allergen_label_for_key("sesame"), "sesame");
    }

    #[test]
    fn every_supported_language_resolves_to_itself() {
        for code in SUPPORTED {
            assert_eq!(strings(code).code, code);
        }
    }
}
