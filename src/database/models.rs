// Copyright 2023 Remi Bernotavicius

use derive_more::Display;
use diesel::deserialize::Queryable;
use diesel::expression::Selectable;
use diesel::prelude::Insertable;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops;

/// Anything stored in one of the repository's collections.
pub trait Identified {
    fn raw_id(&self) -> u32;
}

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Display, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);
    };
}

entity_id!(IngredientId);
entity_id!(RecipeId);
entity_id!(ProductId);
entity_id!(PackagingId);
entity_id!(NutritionId);

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// The unit an ingredient is bought in. Labels round-trip through the stored document and
/// spreadsheets, so unknown labels are kept as `Other` instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IngredientUnit {
    Kilogram,
    Gram,
    Liter,
    Milliliter,
    Piece,
    Pack,
    Other(String),
}

impl IngredientUnit {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Kilogram => "公斤",
            Self::Gram => "公克",
            Self::Liter => "公升",
            Self::Milliliter => "毫升",
            Self::Piece => "顆",
            Self::Pack => "包",
            Self::Other(label) => label,
        }
    }

    pub fn import(s: &str) -> Self {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "公斤" | "kilogram" | "kilograms" | "kg" => Self::Kilogram,
            "公克" | "克" | "gram" | "grams" | "g" => Self::Gram,
            "公升" | "liter" | "liters" | "litre" | "l" => Self::Liter,
            "毫升" | "milliliter" | "milliliters" | "ml" => Self::Milliliter,
            "顆" | "個" | "piece" | "pieces" | "pc" => Self::Piece,
            "包" | "pack" | "packs" => Self::Pack,
            _ => Self::Other(s.into()),
        }
    }
}

impl fmt::Display for IngredientUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for IngredientUnit {
    fn from(s: String) -> Self {
        Self::import(&s)
    }
}

impl From<IngredientUnit> for String {
    fn from(unit: IngredientUnit) -> Self {
        unit.as_str().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    pub unit: IngredientUnit,
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeLine {
    pub ingredient_id: IngredientId,
    #[serde(rename = "amount", default)]
    pub amount_grams: f64,
}

fn default_servings() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    #[serde(default = "default_servings")]
    pub servings: u32,
    #[serde(rename = "totalWeight", default, skip_serializing_if = "Option::is_none")]
    pub total_weight_override: Option<f64>,
    #[serde(rename = "ingredients", default)]
    pub ingredient_lines: Vec<RecipeLine>,
}

impl Recipe {
    /// The hand-measured finished weight, if one was entered.
    pub fn weight_override(&self) -> Option<f64> {
        self.total_weight_override.filter(|w| *w > 0.0)
    }

    pub fn servings(&self) -> u32 {
        self.servings.max(1)
    }
}

#[derive(Debug, Display, Default, Hash, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantityUnit {
    #[default]
    #[display("g")]
    #[serde(rename = "weight")]
    ByWeight,
    #[display("份")]
    #[serde(rename = "serving")]
    ByServing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecipeLine {
    pub recipe_id: RecipeId,
    #[serde(rename = "amount", default)]
    pub quantity: f64,
    #[serde(rename = "unit", default)]
    pub quantity_unit: QuantityUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingLine {
    pub packaging_id: PackagingId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub selling_price: f64,
    #[serde(rename = "recipes", default)]
    pub recipe_lines: Vec<ProductRecipeLine>,
    #[serde(rename = "packaging", default)]
    pub packaging_lines: Vec<PackagingLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packaging {
    pub id: PackagingId,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub note: Option<String>,
}

/// The eight tracked nutrients. Facts are per 100g, recipe totals are absolute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nutrients {
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub saturated_fat: f64,
    #[serde(default)]
    pub trans_fat: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub sugar: f64,
    #[serde(default)]
    pub sodium: f64,
}

impl Nutrients {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn scale(&self, multiplier: f64) -> Self {
        Self {
            calories: self.calories * multiplier,
            protein: self.protein * multiplier,
            fat: self.fat * multiplier,
            saturated_fat: self.saturated_fat * multiplier,
            trans_fat: self.trans_fat * multiplier,
            carbs: self.carbs * multiplier,
            sugar: self.sugar * multiplier,
            sodium: self.sodium * multiplier,
        }
    }

    /// Values in spreadsheet column order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.calories,
            self.protein,
            self.fat,
            self.saturated_fat,
            self.trans_fat,
            self.carbs,
            self.sugar,
            self.sodium,
        ]
    }

    pub fn from_values(values: [f64; 8]) -> Self {
        let [calories, protein, fat, saturated_fat, trans_fat, carbs, sugar, sodium] = values;
        Self {
            calories,
            protein,
            fat,
            saturated_fat,
            trans_fat,
            carbs,
            sugar,
            sodium,
        }
    }
}

impl ops::Add for Nutrients {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let a = self.values();
        let b = other.values();
        Self::from_values(std::array::from_fn(|i| a[i] + b[i]))
    }
}

impl ops::AddAssign for Nutrients {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl std::iter::Sum for Nutrients {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, n| acc + n)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionFact {
    pub id: NutritionId,
    /// Joined to `Ingredient::name`, not to an id.
    #[serde(rename = "ingredient")]
    pub ingredient_name: String,
    #[serde(flatten)]
    pub per_100g: Nutrients,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeNutrition {
    pub recipe_id: RecipeId,
    #[serde(rename = "name")]
    pub recipe_name: String,
    #[serde(flatten)]
    pub totals: Nutrients,
}

macro_rules! identified {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl Identified for $ty {
                fn raw_id(&self) -> u32 {
                    self.$field.0
                }
            }
        )*
    };
}

identified! {
    Ingredient => id,
    Recipe => id,
    Product => id,
    Packaging => id,
    NutritionFact => id,
    RecipeNutrition => recipe_id,
}

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = crate::database::schema::slots)]
pub struct Slot {
    pub name: String,
    pub value: String,
}

#[test]
fn unit_labels() {
    assert_eq!(IngredientUnit::import("公斤"), IngredientUnit::Kilogram);
    assert_eq!(IngredientUnit::import(" Kilogram "), IngredientUnit::Kilogram);
    assert_eq!(IngredientUnit::import("顆"), IngredientUnit::Piece);
    assert_eq!(IngredientUnit::import("ml"), IngredientUnit::Milliliter);
    assert_eq!(
        IngredientUnit::import("打"),
        IngredientUnit::Other("打".into())
    );

    use IngredientUnit::*;
    for unit in [Kilogram, Gram, Liter, Milliliter, Piece, Pack] {
        assert_eq!(IngredientUnit::import(unit.as_str()), unit);
    }
}

#[test]
fn ingredient_document_shape() {
    let ingredient: Ingredient = serde_json::from_str(
        r#"{ "id": 1, "name": "麵粉", "category": "", "unit": "公斤", "price": 35 }"#,
    )
    .unwrap();
    assert_eq!(ingredient.id, IngredientId(1));
    assert_eq!(ingredient.category, None);
    assert_eq!(ingredient.unit, IngredientUnit::Kilogram);

    let value = serde_json::to_value(&ingredient).unwrap();
    assert_eq!(value["unit"], "公斤");
    assert_eq!(value["price"], 35.0);
}

#[test]
fn nutrition_fact_document_shape() {
    let fact: NutritionFact =
        serde_json::from_str(r#"{ "id": 3, "ingredient": "奶油", "calories": 717, "fat": 81 }"#)
            .unwrap();
    assert_eq!(fact.ingredient_name, "奶油");
    assert_eq!(fact.per_100g.calories, 717.0);
    assert_eq!(fact.per_100g.fat, 81.0);
    assert_eq!(fact.per_100g.sodium, 0.0);

    let value = serde_json::to_value(&fact).unwrap();
    assert_eq!(value["saturatedFat"], 0.0);
    assert_eq!(value["ingredient"], "奶油");
}

#[test]
fn nutrients_arithmetic() {
    let a = Nutrients {
        calories: 100.0,
        protein: 2.0,
        ..Nutrients::zero()
    };
    let total: Nutrients = [a, a.scale(2.0)].into_iter().sum();
    assert_eq!(total.calories, 300.0);
    assert_eq!(total.protein, 6.0);
    assert_eq!(total.fat, 0.0);
}
